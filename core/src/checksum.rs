use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};

pub fn sha256_file(path: impl AsRef<Path>) -> CoreResult<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1024 * 64];
    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn verify_sha256(path: impl AsRef<Path>, expected: &str) -> CoreResult<()> {
    let actual = sha256_file(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        Ok(())
    } else {
        Err(CoreError::ChecksumMismatch {
            expected: expected.trim().to_ascii_lowercase(),
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    // sha256("Hello Rust")
    const HELLO_RUST: &str = "dc5d63134fb696626c4bf28e1232434ab040acc10a66cfee55dacdd70dae82a3";

    #[test]
    fn matching_digest_passes_in_any_case() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Hello Rust").unwrap();
        assert!(verify_sha256(file.path(), HELLO_RUST).is_ok());
        assert!(verify_sha256(file.path(), &HELLO_RUST.to_uppercase()).is_ok());
    }

    #[test]
    fn wrong_digest_reports_both_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "Hello Rust").unwrap();
        match verify_sha256(file.path(), "badhash") {
            Err(CoreError::ChecksumMismatch { expected, actual }) => {
                assert_eq!(expected, "badhash");
                assert_eq!(actual, HELLO_RUST);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
