use anyhow::{Context, Result};
use log::*;
use std::fs;
use std::path::Path;

/// Reads a whole binary file into memory. The buffer is released on drop.
pub fn read_binary<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let path = path.as_ref();
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file `{}`.", path.display()))?;
    debug!("Read {} byte(s) from `{}`.", bytes.len(), path.display());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process;

    #[test]
    fn reads_every_byte() {
        let path = std::env::temp_dir().join(format!("boreal-read-{}.bin", process::id()));
        let contents = [0x03, 0x02, 0x23, 0x07, 0x00, 0xff];
        fs::write(&path, contents).unwrap();

        let bytes = read_binary(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(bytes, contents);
    }

    #[test]
    fn missing_file_names_the_path() {
        let path = std::env::temp_dir().join("boreal-does-not-exist.spv");

        let error = read_binary(&path).unwrap_err();
        assert!(error.to_string().contains("boreal-does-not-exist.spv"));
    }
}
