use std::path::{Path, PathBuf};

use crate::{BenchConfig, Error, Result, RunParams};

pub const KERNEL_EXTENSION: &str = "wgsl";

pub fn load(path: &Path) -> Result<BenchConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&text)
        .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))
}

/// Directory holding `<kernel>.wgsl` sources.
pub fn kernel_dir(config: &BenchConfig) -> PathBuf {
    match &config.kernel_dir {
        Some(dir) => dir.clone(),
        None => Path::new(env!("CARGO_MANIFEST_DIR")).join("kernels"),
    }
}

pub fn kernel_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.{}", name, KERNEL_EXTENSION))
}

pub fn load_kernel_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::KernelSource {
        path: path.to_path_buf(),
        source,
    })
}

/// Reject sizes the runner cannot dispatch and runs that would time nothing.
pub fn validate(config: &BenchConfig, params: &RunParams) -> Result<()> {
    if config.local_size == 0 {
        return Err(Error::InvalidConfig("local size must be positive".into()));
    }
    if config.global_size == 0 || config.global_size % config.local_size != 0 {
        return Err(Error::InvalidConfig(format!(
            "global size {} is not a positive multiple of local size {}",
            config.global_size, config.local_size
        )));
    }
    if params.iterations < 2 {
        return Err(Error::InvalidConfig(format!(
            "{} iteration(s) requested; the first is warm-up, at least 2 are needed",
            params.iterations
        )));
    }
    if config.kernels.is_empty() {
        return Err(Error::InvalidConfig("no kernels selected".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn params(iterations: u32) -> RunParams {
        RunParams {
            device: 0,
            iterations,
            verify: false,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        validate(&BenchConfig::default(), &params(10)).unwrap();
    }

    #[test]
    fn test_single_iteration_rejected() {
        let err = validate(&BenchConfig::default(), &params(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert!(validate(&BenchConfig::default(), &params(0)).is_err());
    }

    #[test]
    fn test_extents_must_divide() {
        let mut cfg = BenchConfig::default();
        cfg.global_size = 1000;
        cfg.local_size = 256;
        assert!(validate(&cfg, &params(2)).is_err());
        cfg.local_size = 0;
        assert!(validate(&cfg, &params(2)).is_err());
        cfg.global_size = 4096;
        cfg.local_size = 64;
        validate(&cfg, &params(2)).unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("membw.json");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"{{ "global_size": 8192, "local_size": 64, "kernels": ["global_read_single"], "seed": 7 }}"#
        )
        .unwrap();

        let cfg = load(&path).unwrap();
        assert_eq!(cfg.global_size, 8192);
        assert_eq!(cfg.local_size, 64);
        assert_eq!(cfg.halo, 31);
        assert_eq!(cfg.kernels, vec!["global_read_single".to_string()]);
        assert_eq!(cfg.seed, Some(7));
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ global_size: ").unwrap();
        assert!(matches!(load(&path), Err(Error::InvalidConfig(_))));
        assert!(matches!(
            load(&dir.path().join("missing.json")),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_kernel_path_convention() {
        let path = kernel_path(Path::new("/k"), "global_read_linear");
        assert_eq!(path, PathBuf::from("/k/global_read_linear.wgsl"));
    }

    #[test]
    fn test_bundled_kernels_present() {
        let dir = kernel_dir(&BenchConfig::default());
        for name in BenchConfig::default().kernels {
            let source = load_kernel_source(&kernel_path(&dir, &name)).unwrap();
            assert!(source.contains(&format!("fn {}(", name)));
        }
    }

    #[test]
    fn test_missing_kernel_source() {
        let err = load_kernel_source(Path::new("/nonexistent/membw.wgsl")).unwrap_err();
        assert!(matches!(err, Error::KernelSource { .. }));
    }
}
