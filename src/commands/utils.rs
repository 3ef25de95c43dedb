use std::fs;
use std::io::Write;
use std::path::Path;

use png2svg::VectorizeResult;

/// Write `svg` to `path`, or to stdout when no path is given.
pub fn write_output(path: Option<&Path>, svg: &str) -> VectorizeResult<()> {
    match path {
        Some(path) => {
            fs::write(path, svg)?;
            eprintln!("SVG saved to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(svg.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.svg");
        write_output(Some(&path), "<svg/>").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "<svg/>");
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.svg");
        let err = write_output(Some(&path), "<svg/>").unwrap_err();
        assert_eq!(err.kind(), png2svg::ErrorKind::Io);
    }
}
