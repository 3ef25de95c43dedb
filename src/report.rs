use std::process::ExitCode;

use png2svg::{ErrorKind, VectorizeError};

/// Print an error to stderr with a hint where one helps.
pub fn report_error(err: &VectorizeError) {
    eprintln!("error [{}]: {err}", err.kind());
    match err {
        VectorizeError::Options { .. } => {
            eprintln!();
            eprintln!("Run `png2svg --help` to see the accepted ranges.");
        }
        VectorizeError::Decode(_) | VectorizeError::InvalidBuffer(_) => {
            eprintln!();
            eprintln!("The input must be a readable PNG or another format the decoder supports.");
        }
        _ => {}
    }
}

/// Process exit code for an error: 2 for options, 3 for decoding, 1 otherwise.
pub fn exit_code(err: &VectorizeError) -> ExitCode {
    match err.kind() {
        ErrorKind::Options => ExitCode::from(2),
        ErrorKind::Decode => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}
