use std::process::ExitCode;

fn main() -> ExitCode {
    match labelscan_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("labelscan: {e}");
            ExitCode::FAILURE
        }
    }
}
