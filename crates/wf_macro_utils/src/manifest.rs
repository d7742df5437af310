use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use std::time::SystemTime;

use toml_edit::{Document, Item, Table};

/// The parsed `Cargo.toml` of the crate a macro is expanding in.
///
/// Generated code must name `wf_*` crates by a path the caller can reach.
/// A caller may depend on `wf_serial` directly or only on a facade crate, so
/// the path is resolved from its manifest:
///
/// 1. `name` listed in `[dependencies]`: `::name`.
/// 2. `name` starts with `wf_` and the caller depends on `weft`, `wf_core` or
///    `wf` (checked in that order): `::facade::rest`, e.g. `wf_serial` becomes
///    `::wf_core::serial`.
/// 3. The same two rules against `[dev-dependencies]`.
/// 4. Otherwise `::name`.
///
/// A crate that expands its own derives should declare
/// `extern crate self as wf_serial;` so that rule 4 resolves.
///
/// ```rust,no_run
/// # use wf_macro_utils::Manifest;
/// let path: syn::Path = Manifest::shared(|m| m.get_crate_path("wf_serial"));
/// ```
#[derive(Debug)]
pub struct Manifest {
    pub manifest: Document<Box<str>>,
    pub modified_time: SystemTime,
}

const FACADE_NAMES: [&str; 3] = ["weft", "wf_core", "wf"];
const CRATE_PREFIX: &str = "wf_";

impl Manifest {
    #[inline(never)]
    fn manifest_path() -> PathBuf {
        let Some(dir) = env::var_os("CARGO_MANIFEST_DIR") else {
            panic!("CARGO_MANIFEST_DIR is not set; macros must be expanded by cargo");
        };
        let path = PathBuf::from(dir).join("Cargo.toml");
        assert!(
            path.exists(),
            "Cargo manifest does not exist at path {}",
            path.display(),
        );
        path
    }

    #[inline(never)]
    fn modified_time(path: &Path) -> Result<SystemTime, std::io::Error> {
        std::fs::metadata(path).and_then(|metadata| metadata.modified())
    }

    #[inline(never)]
    fn read(path: &Path) -> Document<Box<str>> {
        let text = std::fs::read_to_string(path)
            .unwrap_or_else(|_| panic!("Unable to read cargo manifest: {}", path.display()))
            .into_boxed_str();
        Document::parse(text)
            .unwrap_or_else(|_| panic!("Failed to parse cargo manifest: {}", path.display()))
    }

    fn parse_path(text: &str) -> syn::Path {
        syn::parse_str(text).unwrap_or_else(|_| panic!("`{text}` is not a valid path"))
    }

    fn find_in(deps: &Table, name: &str) -> Option<syn::Path> {
        if deps.contains_key(name) {
            return Some(Self::parse_path(&format!("::{name}")));
        }
        let module = name.strip_prefix(CRATE_PREFIX)?;
        FACADE_NAMES
            .iter()
            .find(|facade| deps.contains_key(facade))
            .map(|facade| Self::parse_path(&format!("::{facade}::{module}")))
    }

    /// Resolves the path of crate `name` as seen from the caller.
    #[inline(never)]
    pub fn get_crate_path(&self, name: &str) -> syn::Path {
        for table in ["dependencies", "dev-dependencies"] {
            if let Some(Item::Table(deps)) = self.manifest.get(table)
                && let Some(path) = Self::find_in(deps, name)
            {
                return path;
            }
        }
        Self::parse_path(&format!("::{name}"))
    }

    /// Runs `func` against the caller's manifest, parsing it at most once per
    /// modification.
    pub fn shared<R>(func: impl FnOnce(&Self) -> R) -> R {
        static MANIFESTS: RwLock<BTreeMap<PathBuf, Manifest>> = RwLock::new(BTreeMap::new());

        let path = Self::manifest_path();
        let modified_time = Self::modified_time(&path)
            .unwrap_or_else(|err| panic!("Cannot stat {}: {err}", path.display()));

        {
            let manifests = MANIFESTS.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(manifest) = manifests.get(&path)
                && manifest.modified_time == modified_time
            {
                return func(manifest);
            }
        }

        let manifest = Manifest {
            manifest: Self::read(&path),
            modified_time,
        };
        let result = func(&manifest);

        MANIFESTS
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path, manifest);

        result
    }
}
