use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use uuid::Uuid;

use crate::error::PipelineError;

/// Kind of content an artifact holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    RawVideo,
    RawAudio,
    RawText,
    Transcript,
    Summary,
    SynthesizedAudio,
    TempoAudio,
}

/// Broad media class used to validate stage inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    Video,
    Audio,
    Text,
}

impl ArtifactKind {
    pub fn media_class(&self) -> MediaClass {
        match self {
            ArtifactKind::RawVideo => MediaClass::Video,
            ArtifactKind::RawAudio
            | ArtifactKind::SynthesizedAudio
            | ArtifactKind::TempoAudio => MediaClass::Audio,
            ArtifactKind::RawText | ArtifactKind::Transcript | ArtifactKind::Summary => {
                MediaClass::Text
            }
        }
    }
}

/// Storage namespace an artifact lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    /// Client-supplied or fetched raw inputs
    Uploads,
    /// Derived results
    Outputs,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Uploads => "uploads",
            Namespace::Outputs => "outputs",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "uploads" => Some(Namespace::Uploads),
            "outputs" => Some(Namespace::Outputs),
            _ => None,
        }
    }
}

/// An immutable, uniquely identified unit of stored content.
///
/// The storage location never changes after creation; transformations
/// always produce a new artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: Uuid,
    pub kind: ArtifactKind,
    /// Client-visible reference, e.g. `outputs/<id>.mp3`
    pub relative_path: String,
    /// ISO language code, populated after detection or forcing
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// The opaque reference clients chain into the next stage call.
    pub fn reference(&self) -> &str {
        &self.relative_path
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// A reserved output path handed to an external tool that writes the
/// file itself (ffmpeg, yt-dlp). Turned into an [`Artifact`] by
/// [`ArtifactStore::seal`] once the tool has run.
#[derive(Debug)]
pub struct StagedFile {
    pub id: Uuid,
    pub path: PathBuf,
    relative_path: String,
}

impl StagedFile {
    pub fn reference(&self) -> &str {
        &self.relative_path
    }
}

/// Filesystem-backed mapping from artifact identifier to byte content.
///
/// Owns the `uploads/` and `outputs/` namespaces under a single root.
/// Identifiers are generated server-side (uuid v4) and treated as opaque
/// filenames; `resolve` confines every reference to the two namespaces.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Open the store, creating both namespaces if missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let root = root.into();
        for ns in [Namespace::Uploads, Namespace::Outputs] {
            fs_err::create_dir_all(root.join(ns.as_str()))?;
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path for an artifact's bytes.
    pub fn absolute_path(&self, artifact: &Artifact) -> PathBuf {
        self.root.join(&artifact.relative_path)
    }

    /// Write bytes under a fresh identifier and return the artifact.
    pub fn create(
        &self,
        ns: Namespace,
        kind: ArtifactKind,
        ext: &str,
        bytes: &[u8],
    ) -> Result<Artifact, PipelineError> {
        let staged = self.allocate(ns, ext);
        fs_err::write(&staged.path, bytes)?;
        Ok(Artifact {
            id: staged.id,
            kind,
            relative_path: staged.relative_path,
            language: None,
            created_at: Utc::now(),
        })
    }

    /// UTF-8 convenience over [`create`](Self::create).
    pub fn create_text(
        &self,
        ns: Namespace,
        kind: ArtifactKind,
        text: &str,
    ) -> Result<Artifact, PipelineError> {
        self.create(ns, kind, "txt", text.as_bytes())
    }

    /// Reserve a unique target path for an external tool to write to.
    pub fn allocate(&self, ns: Namespace, ext: &str) -> StagedFile {
        let id = Uuid::new_v4();
        let filename = format!("{}.{}", id, ext);
        let relative_path = format!("{}/{}", ns.as_str(), filename);
        StagedFile {
            id,
            path: self.root.join(ns.as_str()).join(filename),
            relative_path,
        }
    }

    /// Promote a staged file to an artifact, verifying the tool actually
    /// produced it.
    pub fn seal(
        &self,
        staged: StagedFile,
        kind: ArtifactKind,
        tool: &str,
    ) -> Result<Artifact, PipelineError> {
        if !staged.path.is_file() {
            return Err(PipelineError::transform(
                tool,
                format!("expected output file missing: {}", staged.reference()),
            ));
        }
        Ok(Artifact {
            id: staged.id,
            kind,
            relative_path: staged.relative_path,
            language: None,
            created_at: Utc::now(),
        })
    }

    /// Resolve a client-supplied reference back to an artifact.
    ///
    /// References are `<namespace>/<uuid>.<ext>`; anything else —
    /// absolute paths, traversal components, unknown namespaces,
    /// non-server-generated identifiers — is rejected as not found
    /// rather than touched on disk.
    pub fn resolve(&self, reference: &str) -> Result<Artifact, PipelineError> {
        let not_found = || PipelineError::ArtifactNotFound(reference.to_string());

        let (ns_part, filename) = reference.split_once('/').ok_or_else(not_found)?;
        let ns = Namespace::from_str(ns_part).ok_or_else(not_found)?;

        // The filename must be a single normal path component.
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(not_found()),
        }

        let (stem, ext) = filename.rsplit_once('.').ok_or_else(not_found)?;
        // Identifiers are only ever generated server-side.
        let id: Uuid = stem.parse().map_err(|_| not_found())?;

        let path = self.root.join(ns.as_str()).join(filename);
        if !path.is_file() {
            return Err(not_found());
        }

        let kind = kind_for(ns, ext);
        Ok(Artifact {
            id,
            kind,
            relative_path: format!("{}/{}", ns.as_str(), filename),
            language: None,
            created_at: Utc::now(),
        })
    }

    /// Read an artifact's bytes.
    pub fn read(&self, artifact: &Artifact) -> Result<Vec<u8>, PipelineError> {
        fs_err::read(self.absolute_path(artifact)).map_err(|_| {
            PipelineError::ArtifactNotFound(artifact.relative_path.clone())
        })
    }

    /// Read an artifact's bytes as UTF-8 text.
    pub fn read_text(&self, artifact: &Artifact) -> Result<String, PipelineError> {
        let bytes = self.read(artifact)?;
        String::from_utf8(bytes)
            .map_err(|_| PipelineError::InvalidInput("artifact is not valid UTF-8 text".into()))
    }

    /// Best-effort, idempotent deletion. Failure is a cleanup miss, not
    /// an error.
    pub fn delete(&self, artifact: &Artifact) {
        let path = self.absolute_path(artifact);
        if let Err(e) = fs_err::remove_file(&path) {
            tracing::debug!(path = %path.display(), error = %e, "artifact cleanup skipped");
        }
    }
}

/// Representative kind for a resolved reference. The exact derivation
/// kind (transcript vs summary) is not recoverable from a path; stages
/// only validate the media class.
fn kind_for(ns: Namespace, ext: &str) -> ArtifactKind {
    match ext.to_lowercase().as_str() {
        "mp4" | "mkv" | "avi" | "mov" | "wmv" | "webm" => ArtifactKind::RawVideo,
        "mp3" | "m4a" | "wav" | "flac" | "ogg" => match ns {
            Namespace::Uploads => ArtifactKind::RawAudio,
            Namespace::Outputs => ArtifactKind::TempoAudio,
        },
        _ => match ns {
            Namespace::Uploads => ArtifactKind::RawText,
            Namespace::Outputs => ArtifactKind::Transcript,
        },
    }
}

/// Pick a safe storage extension from a client filename. The filename
/// itself is never used as a path component.
pub fn sanitize_extension(filename: &str, fallback: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| fallback.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_ne};
    use tempfile::TempDir;

    fn store() -> (TempDir, ArtifactStore) {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn create_then_resolve_round_trips_bytes() {
        let (_dir, store) = store();
        let artifact = store
            .create(Namespace::Uploads, ArtifactKind::RawText, "txt", b"hola mundo")
            .unwrap();

        let resolved = store.resolve(artifact.reference()).unwrap();
        assert_eq!(resolved.id, artifact.id);
        assert_eq!(store.read(&resolved).unwrap(), b"hola mundo");
    }

    #[test]
    fn fresh_identifiers_never_collide_in_practice() {
        let (_dir, store) = store();
        let a = store
            .create(Namespace::Outputs, ArtifactKind::Summary, "txt", b"a")
            .unwrap();
        let b = store
            .create(Namespace::Outputs, ArtifactKind::Summary, "txt", b"b")
            .unwrap();
        assert_ne!(a.reference(), b.reference());
    }

    #[test]
    fn resolve_rejects_traversal_and_foreign_paths() {
        let (_dir, store) = store();

        for reference in [
            "../etc/passwd",
            "uploads/../outputs/x.txt",
            "/etc/passwd",
            "uploads/../../x.txt",
            "secrets/x.txt",
            "uploads",
            "uploads/",
            "uploads/sub/dir.txt",
        ] {
            assert!(
                matches!(
                    store.resolve(reference),
                    Err(PipelineError::ArtifactNotFound(_))
                ),
                "reference should be rejected: {reference}"
            );
        }
    }

    #[test]
    fn resolve_rejects_client_invented_identifiers() {
        let (dir, store) = store();
        // A file that exists but was not named by the server.
        fs_err::write(dir.path().join("uploads").join("evil.txt"), b"x").unwrap();
        assert!(store.resolve("uploads/evil.txt").is_err());
    }

    #[test]
    fn resolve_missing_artifact_is_not_found() {
        let (_dir, store) = store();
        let reference = format!("outputs/{}.txt", Uuid::new_v4());
        assert!(matches!(
            store.resolve(&reference),
            Err(PipelineError::ArtifactNotFound(_))
        ));
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = store();
        let artifact = store
            .create(Namespace::Uploads, ArtifactKind::RawText, "txt", b"gone")
            .unwrap();
        store.delete(&artifact);
        // Second delete is a silent no-op.
        store.delete(&artifact);
        assert!(store.resolve(artifact.reference()).is_err());
    }

    #[test]
    fn seal_requires_the_tool_to_have_written_the_file() {
        let (_dir, store) = store();
        let staged = store.allocate(Namespace::Outputs, "mp3");
        let err = store
            .seal(staged, ArtifactKind::TempoAudio, "ffmpeg")
            .unwrap_err();
        assert!(matches!(err, PipelineError::TransformFailed { .. }));

        let staged = store.allocate(Namespace::Outputs, "mp3");
        fs_err::write(&staged.path, b"audio").unwrap();
        let artifact = store
            .seal(staged, ArtifactKind::TempoAudio, "ffmpeg")
            .unwrap();
        assert!(artifact.reference().starts_with("outputs/"));
    }

    #[test]
    fn sanitize_extension_keeps_only_plain_suffixes() {
        assert_eq!(sanitize_extension("talk.mp3", "bin"), "mp3");
        assert_eq!(sanitize_extension("movie.MP4", "bin"), "mp4");
        assert_eq!(sanitize_extension("no_extension", "bin"), "bin");
        assert_eq!(sanitize_extension("weird.t@r", "bin"), "bin");
        assert_eq!(sanitize_extension("../../etc/passwd", "txt"), "txt");
    }

    #[test]
    fn media_class_groups_kinds() {
        assert_eq!(ArtifactKind::RawVideo.media_class(), MediaClass::Video);
        assert_eq!(ArtifactKind::TempoAudio.media_class(), MediaClass::Audio);
        assert_eq!(ArtifactKind::Summary.media_class(), MediaClass::Text);
    }
}
