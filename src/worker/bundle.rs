//! プレイヤースクリプトのバンドルモジュール
//! エントリースクリプトから `import "name" as alias;` を辿り、依存モジュールの
//! ソースを依存順に並べた1つの値にまとめる。ワーカーへはこの値だけが渡る。
//!
//! import文は行頭（空白を除く）に1文ずつ書く必要がある。それ以外の位置にある
//! importはバンドルされず、評価時に `ScriptError::Bundle` として報告される。

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::ScriptError;

/// スクリプトファイルの拡張子
pub const SCRIPT_EXTENSION: &str = "rhai";

/// バンドルされた依存モジュール
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundledModule {
    /// import文に書かれたままのモジュール名
    pub name: String,
    pub source: String,
}

/// エントリースクリプトとその依存モジュールをまとめたもの
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBundle {
    pub entry_path: PathBuf,
    pub entry: String,
    /// 依存される側が先に来る順序
    pub modules: Vec<BundledModule>,
}

impl ScriptBundle {
    pub fn module(&self, name: &str) -> Option<&BundledModule> {
        self.modules.iter().find(|module| module.name == name)
    }
}

/// エントリースクリプトを読み込み、importを解決してバンドルする
pub fn bundle_script(entry_path: &Path) -> Result<ScriptBundle, ScriptError> {
    let entry = read_script(entry_path)?;

    let base_dir = entry_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut bundler = Bundler {
        base_dir,
        modules: Vec::new(),
        visiting: Vec::new(),
        done: HashSet::new(),
    };

    for name in scan_imports(&entry) {
        bundler.visit(&name)?;
    }

    debug!(
        entry = %entry_path.display(),
        modules = bundler.modules.len(),
        "script bundled"
    );

    Ok(ScriptBundle {
        entry_path: entry_path.to_path_buf(),
        entry,
        modules: bundler.modules,
    })
}

fn read_script(path: &Path) -> Result<String, ScriptError> {
    fs::read_to_string(path).map_err(|source| ScriptError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// 行頭（空白を除く）にあるimport文の行
fn import_lines(source: &str) -> impl Iterator<Item = &str> {
    source.lines().map(str::trim).filter(|line| {
        line.strip_prefix("import")
            .map_or(false, |rest| rest.starts_with(|c: char| c.is_whitespace() || c == '"'))
    })
}

/// ソース中の `import "..."` 文からモジュール名を取り出す
pub fn scan_imports(source: &str) -> Vec<String> {
    import_lines(source)
        .filter_map(|line| {
            let rest = line.strip_prefix("import")?.trim_start().strip_prefix('"')?;
            let end = rest.find('"')?;
            Some(rest[..end].to_string())
        })
        .collect()
}

/// ソース中のimport文だけを取り出したスクリプト
pub fn import_statements(source: &str) -> String {
    import_lines(source).collect::<Vec<_>>().join("\n")
}

/// モジュール名をエントリースクリプトのディレクトリからの相対パスに解決する
/// 絶対パスや親ディレクトリへの参照は拒否する
pub fn resolve_module_path(base_dir: &Path, name: &str) -> Result<PathBuf, ScriptError> {
    let relative = Path::new(name);

    let escapes = relative
        .components()
        .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));

    if name.is_empty() || escapes {
        return Err(ScriptError::Bundle {
            path: name.to_string(),
            reason: "imports must be relative paths inside the script directory".to_string(),
        });
    }

    let mut path = base_dir.join(relative);
    if path.extension().is_none() {
        path.set_extension(SCRIPT_EXTENSION);
    }

    Ok(path)
}

struct Bundler {
    base_dir: PathBuf,
    modules: Vec<BundledModule>,
    visiting: Vec<String>,
    done: HashSet<String>,
}

impl Bundler {
    /// 深さ優先で依存を辿り、帰りがけ順にモジュールを追加する
    fn visit(&mut self, name: &str) -> Result<(), ScriptError> {
        if self.done.contains(name) {
            return Ok(());
        }

        if self.visiting.iter().any(|visiting| visiting == name) {
            let mut cycle = self.visiting.clone();
            cycle.push(name.to_string());

            return Err(ScriptError::Bundle {
                path: name.to_string(),
                reason: format!("import cycle detected: {}", cycle.join(" -> ")),
            });
        }

        let path = resolve_module_path(&self.base_dir, name)?;
        let source = read_script(&path)?;

        self.visiting.push(name.to_string());
        for dependency in scan_imports(&source) {
            self.visit(&dependency)?;
        }
        self.visiting.pop();

        self.done.insert(name.to_string());
        self.modules.push(BundledModule {
            name: name.to_string(),
            source,
        });

        Ok(())
    }
}
