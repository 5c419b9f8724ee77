//! Loads a command and the packages it imports from disk and drives the
//! `ogo_ir` pipeline over them.

use itertools::Itertools;
use multimap::MultiMap;
pub use ogo_ir::{DeclGraph, Package, Target};
pub use parser::ParseError;
use rustc_hash::FxHashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

const MAIN: &str = "main";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory import paths are resolved against.
    pub src_root: PathBuf,
    pub target: Target,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            src_root: PathBuf::from("."),
            target: Target::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{file}: {error}")]
    Parse {
        file: String,
        src: String,
        error: ParseError,
    },
    #[error("no Go files in {}", .0.display())]
    NoGoFiles(PathBuf),
    #[error("found packages {} in {}", .packages.iter().join(", "), dir.display())]
    PackageMismatch { dir: PathBuf, packages: Vec<String> },
    #[error("{}: package {package} is not a command; use ogo on commands only", dir.display())]
    NotACommand { dir: PathBuf, package: String },
    #[error(transparent)]
    Ir(#[from] ogo_ir::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Writes the error, as an `ariadne` report for parse errors.
    pub fn write(&self, mut w: impl io::Write) -> io::Result<()> {
        match self {
            Error::Parse { file, src, error } => error.write(w, file, src),
            e => writeln!(w, "{e}"),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
    move |source| Error::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Parses the command in `dir` and every package it transitively imports.
pub fn load(dir: &Path, config: &Config) -> Result<DeclGraph> {
    let root = read_package(dir)?;
    if let Some(package) = root.name().filter(|p| *p != MAIN) {
        return Err(Error::NotACommand {
            dir: dir.to_path_buf(),
            package: package.to_string(),
        });
    }
    let mut graph = DeclGraph::default();
    let mut imports = MultiMap::new();
    let mut todo = Vec::new();
    record_imports(MAIN, &root, &mut imports, &mut todo)?;
    graph.packages.insert(MAIN.to_string(), root);
    while let Some(path) = todo.pop() {
        if graph.packages.contains_key(&path) {
            continue;
        }
        let dir = config.src_root.join(&path);
        if !dir.is_dir() {
            return Err(ogo_ir::Error::MissingPackage(path).into());
        }
        log::debug!("loading {path} from {}", dir.display());
        let package = read_package(&dir)?;
        record_imports(&path, &package, &mut imports, &mut todo)?;
        graph.packages.insert(path, package);
    }
    check_cycles(&imports)?;
    log::info!(
        "loaded {} packages ({} files)",
        graph.packages.len(),
        graph.packages.values().map(|p| p.files.len()).sum::<usize>()
    );
    Ok(graph)
}

fn record_imports(
    path: &str,
    package: &Package,
    imports: &mut MultiMap<String, String>,
    todo: &mut Vec<String>,
) -> Result<()> {
    for import in package.files.values().flat_map(|f| &f.imports) {
        if import.path == MAIN {
            return Err(ogo_ir::Error::Malformed(format!(
                "{path}: import \"{MAIN}\" is a program, not an importable package"
            ))
            .into());
        }
        imports.insert(path.to_string(), import.path.clone());
        todo.push(import.path.clone());
    }
    Ok(())
}

/// Parses the `.go` files of one directory, skipping tests.
fn read_package(dir: &Path) -> Result<Package> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error(dir))? {
        let path = entry.map_err(io_error(dir))?.path();
        let is_source = path.extension().map_or(false, |e| e == "go")
            && !path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.ends_with("_test.go"));
        if is_source && path.is_file() {
            paths.push(path);
        }
    }
    if paths.is_empty() {
        return Err(Error::NoGoFiles(dir.to_path_buf()));
    }
    paths.sort();
    let mut package = Package::default();
    for path in paths {
        let src = fs::read_to_string(&path).map_err(io_error(&path))?;
        let file = match parser::parse(&src) {
            Ok(file) => file,
            Err(error) => {
                return Err(Error::Parse {
                    file: path.display().to_string(),
                    src,
                    error,
                })
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        package.files.insert(name, file);
    }
    let packages: Vec<String> = package
        .files
        .values()
        .map(|f| f.package.clone())
        .unique()
        .collect();
    if packages.len() > 1 {
        return Err(Error::PackageMismatch {
            dir: dir.to_path_buf(),
            packages,
        });
    }
    Ok(package)
}

fn check_cycles(imports: &MultiMap<String, String>) -> Result<()> {
    fn visit<'a>(
        p: &'a str,
        imports: &'a MultiMap<String, String>,
        done: &mut FxHashMap<&'a str, bool>,
        stack: &mut Vec<&'a str>,
    ) -> Result<()> {
        match done.get(p) {
            Some(true) => return Ok(()),
            Some(false) => {
                let start = stack.iter().position(|q| *q == p).unwrap_or(0);
                let cycle = stack[start..]
                    .iter()
                    .chain([&p])
                    .map(|q| q.to_string())
                    .collect();
                return Err(ogo_ir::Error::ImportCycle(cycle).into());
            }
            None => (),
        }
        done.insert(p, false);
        stack.push(p);
        for q in imports.get_vec(p).into_iter().flatten() {
            visit(q, imports, done, stack)?;
        }
        stack.pop();
        done.insert(p, true);
        Ok(())
    }
    let mut done = FxHashMap::default();
    let mut roots: Vec<&String> = imports.keys().collect();
    roots.sort();
    for p in roots {
        visit(p, imports, &mut done, &mut Vec::new())?;
    }
    Ok(())
}

/// Generates C for a loaded program.
pub fn compile(graph: &DeclGraph, target: Target) -> Result<String> {
    Ok(ogo_ir::gen_c(graph, target)?)
}

/// The flattened, annotated program as Go source.
pub fn flatten_go(graph: &DeclGraph) -> Result<String> {
    let mut program = ogo_ir::flatten(graph)?;
    let mut types = ogo_ir::TypeMap::default();
    types.check(&mut program.decls)?;
    Ok(program.to_file().to_string())
}

#[cfg(test)]
mod tests {
    use super::{compile, flatten_go, load, Config, Error};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, files: &[(&str, &str)]) {
        for (path, src) in files {
            let path = root.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, src).unwrap();
        }
    }

    fn config(root: &Path) -> Config {
        Config {
            src_root: root.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn loads_imported_packages() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            &[
                (
                    "cmd/main.go",
                    "package main\nimport \"example.com/greet\"\nfunc main() { greet.Hello() }\n",
                ),
                ("cmd/main_test.go", "this is not Go"),
                ("cmd/README", "not a source file"),
                (
                    "example.com/greet/greet.go",
                    "package greet\nfunc Hello() { println(\"hello\") }\n",
                ),
            ],
        );
        let graph = load(&tmp.path().join("cmd"), &config(tmp.path())).unwrap();
        assert_eq!(
            graph.packages.keys().collect::<Vec<_>>(),
            ["example.com/greet", "main"]
        );
        assert_eq!(graph.packages["main"].files.len(), 1);
        assert_eq!(graph.packages["example.com/greet"].name(), Some("greet"));
        let c = compile(&graph, Default::default()).unwrap();
        assert!(c.contains("static void example_com_greet_Hello(void) {"), "{c}");
        let go = flatten_go(&graph).unwrap();
        assert!(go.contains("func example_com_greet_Hello() {"), "{go}");
        assert!(go.contains("func main() {"), "{go}");
    }

    #[test]
    fn rejects_libraries() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), &[("lib/lib.go", "package lib\nfunc F() {}\n")]);
        let e = load(&tmp.path().join("lib"), &config(tmp.path())).unwrap_err();
        assert!(e.to_string().contains("use ogo on commands only"), "{e}");
    }

    #[test]
    fn missing_packages() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            &[("cmd/main.go", "package main\nimport \"nowhere\"\nfunc main() {}\n")],
        );
        let e = load(&tmp.path().join("cmd"), &config(tmp.path())).unwrap_err();
        assert!(
            matches!(e, Error::Ir(ogo_ir::Error::MissingPackage(ref p)) if p == "nowhere"),
            "{e}"
        );
        let e = load(&tmp.path().join("nothing"), &config(tmp.path())).unwrap_err();
        assert!(matches!(e, Error::Io { .. }), "{e}");
    }

    #[test]
    fn import_cycles() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            &[
                ("cmd/main.go", "package main\nimport \"a\"\nfunc main() { a.F() }\n"),
                ("a/a.go", "package a\nimport \"b\"\nfunc F() { b.F() }\n"),
                ("b/b.go", "package b\nimport \"a\"\nfunc F() { a.F() }\n"),
            ],
        );
        let e = load(&tmp.path().join("cmd"), &config(tmp.path())).unwrap_err();
        assert_eq!(e.to_string(), "import cycle not allowed: a -> b -> a");
    }

    #[test]
    fn parse_errors_keep_their_source() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            &[
                ("cmd/a.go", "package main\nfunc main() {}\n"),
                ("cmd/b.go", "package main\nfunc f( {}\n"),
            ],
        );
        let e = load(&tmp.path().join("cmd"), &config(tmp.path())).unwrap_err();
        let Error::Parse { ref file, ref src, .. } = e else {
            panic!("{e}")
        };
        assert!(file.ends_with("b.go"));
        assert!(src.contains("func f("));
        let mut out = Vec::new();
        e.write(&mut out).unwrap();
        assert!(!out.is_empty());
    }

    #[test]
    fn mixed_packages() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            &[
                ("cmd/a.go", "package main\nfunc main() {}\n"),
                ("cmd/b.go", "package other\n"),
            ],
        );
        let e = load(&tmp.path().join("cmd"), &config(tmp.path())).unwrap_err();
        assert!(matches!(e, Error::PackageMismatch { .. }), "{e}");
    }
}
