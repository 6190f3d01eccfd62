//! Fatal error reporting

use crate::error::RefreshError;

/// Print an error the way the binary reports it and return the exit code
pub fn report_error(error: &anyhow::Error, verbose: u8) -> i32 {
    match error.downcast_ref::<RefreshError>() {
        Some(refresh_error) => {
            eprintln!("Error: {}", refresh_error.user_message());
            if verbose > 0 {
                eprintln!("\nDetails:\n{}", refresh_error.developer_message());
            }
            refresh_error.exit_code()
        }
        None => {
            eprintln!("Error: {:#}", error);
            1
        }
    }
}

/// Report the error and terminate the process
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    tracing::error!("Fatal error: {}", error);
    let code = report_error(&error, verbose);
    std::process::exit(code)
}
