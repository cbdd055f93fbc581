use std::path::{Path, PathBuf};

use glob_match::glob_match;

use crate::error::Error;

/**
    Where every intermediate and final file for one title lives.

    All names derive from the title, so a rerun finds the files a previous
    run left behind.
*/
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    dir: PathBuf,
    title: String,
}

impl ArtifactLayout {
    pub fn new(dir: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            title: title.into(),
        }
    }

    fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{suffix}", self.title))
    }

    pub fn raw_video(&self) -> PathBuf {
        self.file(".mp4")
    }

    pub fn raw_audio(&self) -> PathBuf {
        self.file(".m4a")
    }

    pub fn decrypted_video(&self) -> PathBuf {
        self.file("-dec.mp4")
    }

    pub fn decrypted_audio(&self) -> PathBuf {
        self.file("-dec.m4a")
    }

    pub fn final_output(&self) -> PathBuf {
        self.file("-final.mp4")
    }

    /// Output template for a downloader that picks its own tracks.
    pub fn combined_template(&self) -> PathBuf {
        self.file("-temp.%(ext)s")
    }

    /**
        Snapshot which artifacts exist right now.
    */
    pub fn scan(&self) -> PipelineState {
        PipelineState {
            raw_video: self.raw_video().is_file(),
            raw_audio: self.raw_audio().is_file(),
            decrypted_video: self.decrypted_video().is_file(),
            decrypted_audio: self.decrypted_audio().is_file(),
            final_output: self.final_output().is_file(),
        }
    }

    /**
        Find per-format files a combined download left behind.

        Looks for `<title>-temp.f*` first, then `<title>-final.f*`.
    */
    pub fn locate_intermediates(&self) -> Result<Option<Intermediates>, Error> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(rest) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.strip_prefix(self.title.as_str()))
            {
                names.push(rest.to_string());
            }
        }
        names.sort();

        for prefix in ["-temp", "-final"] {
            let video_pattern = format!("{prefix}.f*.mp4");
            let audio_patterns = [
                format!("{prefix}.faudio*.mp4"),
                format!("{prefix}.faudio*.m4a"),
            ];
            let is_audio = |name: &str| audio_patterns.iter().any(|p| glob_match(p, name));

            let video = names
                .iter()
                .find(|name| glob_match(&video_pattern, name) && !is_audio(name));
            if let Some(video) = video {
                let audio = names.iter().find(|name| is_audio(name));
                return Ok(Some(Intermediates {
                    video: self.file(video),
                    audio: audio.map(|name| self.file(name)),
                }));
            }
        }

        Ok(None)
    }
}

/**
    Per-format files produced by a combined download.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intermediates {
    pub video: PathBuf,
    pub audio: Option<PathBuf>,
}

/**
    Which artifacts exist for a title. Drives resume decisions.
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineState {
    pub raw_video: bool,
    pub raw_audio: bool,
    pub decrypted_video: bool,
    pub decrypted_audio: bool,
    pub final_output: bool,
}

impl PipelineState {
    pub fn needs_video_download(&self) -> bool {
        !self.raw_video && !self.decrypted_video
    }

    /**
        Audio is fetched unless some form of it exists already. Optional audio
        is only attempted on a fresh run, not once video was decrypted without it.
    */
    pub fn needs_audio_download(&self, require_audio: bool) -> bool {
        !self.raw_audio && !self.decrypted_audio && (require_audio || !self.decrypted_video)
    }

    pub fn decryption_complete(&self, require_audio: bool) -> bool {
        self.decrypted_video && (self.decrypted_audio || (!self.raw_audio && !require_audio))
    }
}

/**
    `title-dec.mp4` becomes `title-dec.part.mp4`.

    Tools write here first; the file is renamed once it is known to be complete.
*/
pub fn staging_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}.part.{}", ext.to_string_lossy()),
        None => format!("{stem}.part"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    #[test]
    fn test_paths_derive_from_title() {
        let layout = ArtifactLayout::new("/out", "some-show");
        assert_eq!(layout.raw_video(), Path::new("/out/some-show.mp4"));
        assert_eq!(layout.raw_audio(), Path::new("/out/some-show.m4a"));
        assert_eq!(layout.decrypted_audio(), Path::new("/out/some-show-dec.m4a"));
        assert_eq!(layout.final_output(), Path::new("/out/some-show-final.mp4"));
        assert_eq!(
            layout.combined_template(),
            Path::new("/out/some-show-temp.%(ext)s")
        );
    }

    #[test]
    fn test_staging_path() {
        assert_eq!(
            staging_path(Path::new("/out/a-dec.mp4")),
            Path::new("/out/a-dec.part.mp4")
        );
        assert_eq!(staging_path(Path::new("a")), Path::new("a.part"));
    }

    #[test]
    fn test_scan_reflects_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path(), "t");
        assert_eq!(layout.scan(), PipelineState::default());

        touch(dir.path(), "t-dec.mp4");
        touch(dir.path(), "t.m4a");
        let state = layout.scan();
        assert!(state.decrypted_video && state.raw_audio);
        assert!(!state.final_output);
    }

    #[test]
    fn test_resume_decisions() {
        let fresh = PipelineState::default();
        assert!(fresh.needs_video_download());
        assert!(fresh.needs_audio_download(false));
        assert!(!fresh.decryption_complete(false));

        let video_done = PipelineState {
            decrypted_video: true,
            ..Default::default()
        };
        assert!(!video_done.needs_video_download());
        assert!(video_done.needs_audio_download(true));
        assert!(!video_done.needs_audio_download(false));
        assert!(video_done.decryption_complete(false));
        assert!(!video_done.decryption_complete(true));

        let audio_pending = PipelineState {
            decrypted_video: true,
            raw_audio: true,
            ..Default::default()
        };
        assert!(!audio_pending.decryption_complete(false));
    }

    #[test]
    fn test_locate_intermediates() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArtifactLayout::new(dir.path(), "show");
        assert_eq!(layout.locate_intermediates().unwrap(), None);

        touch(dir.path(), "show-final.f3.mp4");
        touch(dir.path(), "other-temp.f1.mp4");
        let found = layout.locate_intermediates().unwrap().unwrap();
        assert_eq!(found.video, dir.path().join("show-final.f3.mp4"));
        assert_eq!(found.audio, None);

        touch(dir.path(), "show-temp.faudio_est.mp4");
        touch(dir.path(), "show-temp.fvideo1.mp4");
        let found = layout.locate_intermediates().unwrap().unwrap();
        assert_eq!(found.video, dir.path().join("show-temp.fvideo1.mp4"));
        assert_eq!(
            found.audio,
            Some(dir.path().join("show-temp.faudio_est.mp4"))
        );
    }
}
