//! Builds the environment the tutorial commands run under.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Copy the ambient process environment and overlay `overrides` on top of
/// it. Later entries win; the result is the complete environment of every
/// spawned command, so the mapping is built once and never touched again.
pub fn compose(overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut env: BTreeMap<String, String> = std::env::vars().collect();
    for (key, value) in overrides {
        env.insert(key.clone(), value.clone());
    }
    env
}

/// Build a classpath string from every file in `lib_dir`: full paths, sorted,
/// joined with `:`.
pub fn classpath<P: AsRef<Path>>(lib_dir: P) -> Result<String, failure::Error> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(lib_dir.as_ref())? {
        entries.push(entry?.path());
    }
    entries.sort();

    let paths: Vec<String> = entries
        .iter()
        .map(|path| path.display().to_string())
        .collect();
    Ok(paths.join(":"))
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;
    use std::fs;

    use super::{classpath, compose};

    #[test]
    fn overrides_win_over_the_ambient_environment() {
        let mut overrides = BTreeMap::new();
        overrides.insert("PATH".to_owned(), "/custom/bin".to_owned());
        overrides.insert("HDFS_BASE".to_owned(), "kiji-music-42".to_owned());

        let env = compose(&overrides);

        assert_eq!(env.get("PATH").map(String::as_str), Some("/custom/bin"));
        assert_eq!(
            env.get("HDFS_BASE").map(String::as_str),
            Some("kiji-music-42")
        );
    }

    #[test]
    fn ambient_variables_are_carried_through() {
        // PATH is set in any reasonable test environment.
        let ambient = std::env::var("PATH").unwrap();

        let env = compose(&BTreeMap::new());

        assert_eq!(env.get("PATH"), Some(&ambient));
    }

    #[test]
    fn classpath_joins_full_jar_paths_with_colons() {
        let lib_dir = tempfile::tempdir().unwrap();
        fs::write(lib_dir.path().join("a.jar"), b"").unwrap();
        fs::write(lib_dir.path().join("b.jar"), b"").unwrap();

        let classpath = classpath(lib_dir.path()).unwrap();

        assert_eq!(
            classpath,
            format!(
                "{0}/a.jar:{0}/b.jar",
                lib_dir.path().display()
            )
        );
    }

    #[test]
    fn classpath_of_a_missing_directory_is_an_error() {
        assert!(classpath("/nonexistent/lib/dir").is_err());
    }
}
