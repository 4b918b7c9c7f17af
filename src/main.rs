use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(p1lot_launcher_lib::run())
}
