//! Skill discovery, bundled-skill installation, and on-demand injection.
//!
//! Grounded directly on pywen's `skills/loader.py` (root walk order, BFS
//! scan, frontmatter parsing and validation, dedup-then-sort) and
//! `skills/system.py` (SHA-256 fingerprint + marker file gating
//! reinstallation of the bundled system skill tree).

use crate::error::{Error, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

const SKILL_FILENAME: &str = "SKILL.md";
const REPO_CONFIG_DIR: &str = ".pywen";
const ADMIN_SKILLS_ROOT: &str = "/etc/pywen/skills";
const MAX_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 1024;
const SYSTEM_SKILLS_MARKER_FILENAME: &str = ".pywen-system-skills.marker";
const SYSTEM_SKILLS_MARKER_SALT: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SkillScope {
    Repo,
    User,
    System,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillMetadata {
    pub name: String,
    pub description: String,
    pub short_description: Option<String>,
    pub path: PathBuf,
    pub scope: SkillScope,
}

#[derive(Debug, Clone)]
pub struct SkillError {
    pub path: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct SkillLoadOutcome {
    pub skills: Vec<SkillMetadata>,
    pub errors: Vec<SkillError>,
}

struct SkillRoot {
    path: PathBuf,
    scope: SkillScope,
}

#[derive(Debug, Deserialize, Default)]
struct Frontmatter {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    metadata: FrontmatterMetadata,
}

#[derive(Debug, Deserialize, Default)]
struct FrontmatterMetadata {
    #[serde(rename = "short-description", default)]
    short_description: Option<String>,
}

/// Discover every skill reachable from `cwd`, in priority order repo > user
/// > system > admin, deduped by name (first occurrence wins) and sorted by
/// `(name, path)`.
pub async fn load_skills(pywen_home: &Path, cwd: &Path) -> SkillLoadOutcome {
    let roots = skill_roots_for_cwd(pywen_home, cwd).await;
    let mut outcome = SkillLoadOutcome::default();
    for root in roots {
        discover_skills_under_root(&root.path, root.scope, &mut outcome).await;
    }

    let mut seen = HashSet::new();
    let mut deduped = Vec::new();
    for skill in outcome.skills {
        if seen.insert(skill.name.clone()) {
            deduped.push(skill);
        }
    }
    deduped.sort_by(|a, b| (a.name.as_str(), &a.path).cmp(&(b.name.as_str(), &b.path)));
    outcome.skills = deduped;
    outcome
}

async fn skill_roots_for_cwd(pywen_home: &Path, cwd: &Path) -> Vec<SkillRoot> {
    let mut roots = Vec::new();
    if let Some(repo_root) = repo_skills_root(cwd).await {
        roots.push(repo_root);
    }
    roots.push(SkillRoot {
        path: pywen_home.join("skills"),
        scope: SkillScope::User,
    });
    roots.push(SkillRoot {
        path: pywen_home.join("skills").join(".system"),
        scope: SkillScope::System,
    });
    if cfg!(unix) {
        roots.push(SkillRoot {
            path: PathBuf::from(ADMIN_SKILLS_ROOT),
            scope: SkillScope::Admin,
        });
    }
    roots
}

async fn repo_skills_root(cwd: &Path) -> Option<SkillRoot> {
    let base = if tokio::fs::metadata(cwd).await.map(|m| m.is_dir()).unwrap_or(false) {
        cwd.to_path_buf()
    } else {
        cwd.parent()?.to_path_buf()
    };
    let base = tokio::fs::canonicalize(&base).await.unwrap_or(base);

    let git_root = find_git_root(&base).await;
    let mut directory = base.clone();
    loop {
        let candidate = directory.join(REPO_CONFIG_DIR).join("skills");
        if tokio::fs::metadata(&candidate).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Some(SkillRoot {
                path: candidate,
                scope: SkillScope::Repo,
            });
        }
        if git_root.as_deref() == Some(directory.as_path()) {
            break;
        }
        match directory.parent() {
            Some(parent) if git_root.is_some() => directory = parent.to_path_buf(),
            _ => break,
        }
    }
    None
}

async fn find_git_root(start: &Path) -> Option<PathBuf> {
    let mut directory = Some(start.to_path_buf());
    while let Some(dir) = directory {
        let marker = dir.join(".git");
        if tokio::fs::metadata(&marker).await.is_ok() {
            return Some(dir);
        }
        directory = dir.parent().map(Path::to_path_buf);
    }
    None
}

/// Breadth-first scan under `root`, skipping hidden entries and symlinks,
/// collecting every `SKILL.md` found. Parse failures are recorded as
/// [`SkillError`]s except under [`SkillScope::System`], where a malformed
/// bundled skill is silently skipped rather than surfaced to the user.
async fn discover_skills_under_root(root: &Path, scope: SkillScope, outcome: &mut SkillLoadOutcome) {
    let root = match tokio::fs::canonicalize(root).await {
        Ok(r) => r,
        Err(_) => return,
    };
    if !tokio::fs::metadata(&root).await.map(|m| m.is_dir()).unwrap_or(false) {
        return;
    }

    let mut queue = VecDeque::from([root]);
    while let Some(directory) = queue.pop_front() {
        let mut entries = match tokio::fs::read_dir(&directory).await {
            Ok(entries) => entries,
            Err(_) => continue,
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(_) => continue,
            };
            if entry.path().symlink_metadata().map(|m| m.file_type().is_symlink()).unwrap_or(false) {
                continue;
            }
            if metadata.is_dir() {
                queue.push_back(entry.path());
            } else if metadata.is_file() && name == SKILL_FILENAME {
                match parse_skill_file(&entry.path(), scope).await {
                    Ok(skill) => outcome.skills.push(skill),
                    Err(err) => {
                        if scope != SkillScope::System {
                            outcome.errors.push(SkillError {
                                path: entry.path(),
                                message: err.to_string(),
                            });
                        }
                    }
                }
            }
        }
    }
}

async fn parse_skill_file(path: &Path, scope: SkillScope) -> Result<SkillMetadata> {
    let contents = tokio::fs::read_to_string(path).await?;
    let frontmatter_text = extract_frontmatter(&contents)
        .ok_or_else(|| Error::invalid_input("missing YAML frontmatter delimited by ---"))?;
    let frontmatter: Frontmatter = serde_yaml::from_str(frontmatter_text)?;

    let name = sanitize_single_line(&frontmatter.name);
    let description = sanitize_single_line(&frontmatter.description);
    let short_description = frontmatter
        .metadata
        .short_description
        .map(|s| sanitize_single_line(&s))
        .filter(|s| !s.is_empty());

    validate_field(&name, MAX_NAME_LEN, "name")?;
    validate_field(&description, MAX_DESCRIPTION_LEN, "description")?;
    if let Some(short) = &short_description {
        validate_field(short, MAX_DESCRIPTION_LEN, "metadata.short-description")?;
    }

    let resolved_path = tokio::fs::canonicalize(path).await.unwrap_or_else(|_| path.to_path_buf());
    Ok(SkillMetadata {
        name,
        description,
        short_description,
        path: resolved_path,
        scope,
    })
}

fn sanitize_single_line(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn validate_field(value: &str, max_len: usize, field_name: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_input(format!("missing field `{field_name}`")));
    }
    if value.len() > max_len {
        return Err(Error::invalid_input(format!(
            "invalid {field_name}: exceeds maximum length of {max_len} characters"
        )));
    }
    Ok(())
}

fn extract_frontmatter(contents: &str) -> Option<&str> {
    let mut lines = contents.lines();
    if lines.next()?.trim() != "---" {
        return None;
    }

    let rest = &contents[contents.find('\n').map(|i| i + 1).unwrap_or(contents.len())..];
    let closing = rest.find("\n---")?;
    let frontmatter = &rest[..closing];
    Some(frontmatter)
}

/// One line the skills section of the system prompt lists per discovered
/// skill: `name — description`.
pub fn format_skill_summary(skill: &SkillMetadata) -> String {
    format!("- {}: {}", skill.name, skill.description)
}

// ============================================================================
// SYSTEM SKILL INSTALLATION
// ============================================================================

/// Directory the bundled system skills cache under `pywen_home` regardless
/// of whether it is currently populated.
pub fn system_cache_root_dir(pywen_home: &Path) -> PathBuf {
    pywen_home.join("skills").join(".system")
}

/// Reconcile the bundled `embedded_skills_dir` tree against the cache under
/// `pywen_home`, reinstalling only when the fingerprint marker is stale or
/// absent.
pub async fn install_system_skills(pywen_home: &Path, embedded_skills_dir: &Path) -> Result<()> {
    let dest = system_cache_root_dir(pywen_home);
    tokio::fs::create_dir_all(&dest).await?;

    let marker_path = dest.join(SYSTEM_SKILLS_MARKER_FILENAME);
    let expected = embedded_system_skills_fingerprint(embedded_skills_dir).await?;

    if let Ok(marker) = tokio::fs::read_to_string(&marker_path).await {
        if marker.trim() == expected {
            return Ok(());
        }
    }

    if tokio::fs::metadata(&dest).await.is_ok() {
        tokio::fs::remove_dir_all(&dest).await?;
    }
    copy_dir_recursive(embedded_skills_dir, &dest).await?;
    tokio::fs::write(&marker_path, format!("{expected}\n")).await?;
    Ok(())
}

async fn embedded_system_skills_fingerprint(embedded_dir: &Path) -> Result<String> {
    let mut items: Vec<(String, Option<String>)> = Vec::new();
    let mut queue = VecDeque::from([embedded_dir.to_path_buf()]);
    while let Some(directory) = queue.pop_front() {
        let rel_root = directory
            .strip_prefix(embedded_dir)
            .unwrap_or(&directory)
            .to_string_lossy()
            .into_owned();
        items.push((rel_root, None));

        let mut entries = tokio::fs::read_dir(&directory).await?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                queue.push_back(entry.path());
            } else {
                let bytes = tokio::fs::read(entry.path()).await?;
                let hash = format!("{:x}", Sha256::digest(&bytes));
                let rel_path = entry
                    .path()
                    .strip_prefix(embedded_dir)
                    .unwrap_or(&entry.path())
                    .to_string_lossy()
                    .into_owned();
                items.push((rel_path, Some(hash)));
            }
        }
    }

    items.sort_by(|a, b| a.0.cmp(&b.0));
    let mut hasher = Sha256::new();
    hasher.update(SYSTEM_SKILLS_MARKER_SALT.as_bytes());
    for (path, contents_hash) in items {
        hasher.update(path.as_bytes());
        if let Some(hash) = contents_hash {
            hasher.update(hash.as_bytes());
        }
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn copy_dir_recursive<'a>(
    source: &'a Path,
    dest: &'a Path,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(dest).await?;
        let mut entries = tokio::fs::read_dir(source).await?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let target = dest.join(entry.file_name());
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                copy_dir_recursive(&entry.path(), &target).await?;
            } else {
                tokio::fs::copy(entry.path(), &target).await?;
            }
        }
        Ok(())
    })
}

use std::future::Future;
use std::pin::Pin;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_frontmatter_requires_opening_and_closing_delimiters() {
        let text = "---\nname: foo\ndescription: bar\n---\nbody";
        assert_eq!(extract_frontmatter(text), Some("name: foo\ndescription: bar"));
        assert_eq!(extract_frontmatter("no frontmatter here"), None);
        assert_eq!(extract_frontmatter("---\nname: foo"), None);
    }

    #[test]
    fn sanitize_single_line_collapses_whitespace() {
        assert_eq!(sanitize_single_line("  foo\n  bar  "), "foo bar");
    }

    #[test]
    fn validate_field_rejects_empty_and_oversized() {
        assert!(validate_field("", 10, "name").is_err());
        assert!(validate_field(&"x".repeat(11), 10, "name").is_err());
        assert!(validate_field("ok", 10, "name").is_ok());
    }

    #[tokio::test]
    async fn parse_skill_file_extracts_name_and_description() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SKILL_FILENAME);
        tokio::fs::write(
            &path,
            "---\nname: git-commit\ndescription: Compose a commit message.\n---\nBody text\n",
        )
        .await
        .unwrap();

        let skill = parse_skill_file(&path, SkillScope::User).await.unwrap();
        assert_eq!(skill.name, "git-commit");
        assert_eq!(skill.description, "Compose a commit message.");
        assert!(skill.short_description.is_none());
    }

    #[tokio::test]
    async fn parse_skill_file_rejects_missing_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SKILL_FILENAME);
        tokio::fs::write(&path, "no frontmatter").await.unwrap();
        assert!(parse_skill_file(&path, SkillScope::User).await.is_err());
    }

    #[tokio::test]
    async fn discover_skips_hidden_directories() {
        let dir = tempfile::tempdir().unwrap();
        let hidden = dir.path().join(".hidden");
        tokio::fs::create_dir_all(&hidden).await.unwrap();
        tokio::fs::write(
            hidden.join(SKILL_FILENAME),
            "---\nname: hidden\ndescription: d\n---\n",
        )
        .await
        .unwrap();

        let visible = dir.path().join("visible");
        tokio::fs::create_dir_all(&visible).await.unwrap();
        tokio::fs::write(
            visible.join(SKILL_FILENAME),
            "---\nname: visible\ndescription: d\n---\n",
        )
        .await
        .unwrap();

        let mut outcome = SkillLoadOutcome::default();
        discover_skills_under_root(dir.path(), SkillScope::User, &mut outcome).await;
        assert_eq!(outcome.skills.len(), 1);
        assert_eq!(outcome.skills[0].name, "visible");
    }

    #[tokio::test]
    async fn install_system_skills_is_idempotent_when_fingerprint_unchanged() {
        let embedded = tempfile::tempdir().unwrap();
        tokio::fs::write(embedded.path().join("note.md"), "hello").await.unwrap();
        let home = tempfile::tempdir().unwrap();

        install_system_skills(home.path(), embedded.path()).await.unwrap();
        let marker_path = system_cache_root_dir(home.path()).join(SYSTEM_SKILLS_MARKER_FILENAME);
        let first = tokio::fs::read_to_string(&marker_path).await.unwrap();

        install_system_skills(home.path(), embedded.path()).await.unwrap();
        let second = tokio::fs::read_to_string(&marker_path).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn install_system_skills_reinstalls_when_content_changes() {
        let embedded = tempfile::tempdir().unwrap();
        tokio::fs::write(embedded.path().join("note.md"), "v1").await.unwrap();
        let home = tempfile::tempdir().unwrap();
        install_system_skills(home.path(), embedded.path()).await.unwrap();

        tokio::fs::write(embedded.path().join("note.md"), "v2").await.unwrap();
        install_system_skills(home.path(), embedded.path()).await.unwrap();

        let installed = tokio::fs::read_to_string(
            system_cache_root_dir(home.path()).join("note.md"),
        )
        .await
        .unwrap();
        assert_eq!(installed, "v2");
    }
}
