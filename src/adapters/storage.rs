use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: String) -> Self {
        Self { base_path }
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }

    fn locate(&self, path: &str) -> String {
        Path::new(&self.base_path).join(path).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("captures").display().to_string();
        let storage = LocalStorage::new(base);

        tokio_test::block_on(async {
            storage.write_file("frame-0.jpg", b"\xff\xd8").await.unwrap();
        });

        let data = fs::read(temp_dir.path().join("captures/frame-0.jpg")).unwrap();
        assert_eq!(data, b"\xff\xd8");

        assert!(storage.locate("frame-0.jpg").ends_with("frame-0.jpg"));
    }
}
