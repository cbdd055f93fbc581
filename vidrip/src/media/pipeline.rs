use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::drm::{
    DecryptionKey, KeySource, LicenseRequest, Protection, Pssh, extract_pssh, resolve_protection,
};
use crate::error::{Error, PipelineError, Stage, StageExt};
use crate::service::{Catalog, ContentIdentity, StreamDescriptor, Transport, resolve_identity};
use crate::util::fs::{promote, remove_artifact};

use super::artifacts::{ArtifactLayout, Intermediates, staging_path};
use super::formats::{FormatSelection, parse_report, select_formats};
use super::tools::MediaTools;

/**
    How a run ended.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The final file was already on disk; nothing was done
    AlreadyComplete(PathBuf),
    Completed(PathBuf),
}

/**
    Sequences discovery, download, key acquisition, decryption and muxing
    for one title.

    Progress lives entirely in the files under `config.output_dir`. Every
    run rescans them and skips whatever is already done, so a run can be
    repeated after any failure. Two runs must never work on the same title
    concurrently.
*/
pub struct Pipeline<C, K, T> {
    catalog: C,
    keys: K,
    tools: T,
    config: Config,
}

impl<C, K, T> Pipeline<C, K, T>
where
    C: Catalog,
    K: KeySource,
    T: MediaTools,
{
    pub fn new(catalog: C, keys: K, tools: T, config: Config) -> Self {
        Self {
            catalog,
            keys,
            tools,
            config,
        }
    }

    pub async fn run(&self, url: &str) -> Result<Outcome, PipelineError> {
        let identity = resolve_identity(url).stage(Stage::Resolve)?;
        info!(
            service = %identity.service,
            content_id = %identity.content_id,
            title = %identity.title,
            "resolved content"
        );

        tokio::fs::create_dir_all(&self.config.output_dir)
            .await
            .map_err(Error::from)
            .stage(Stage::Resolve)?;
        let layout = ArtifactLayout::new(&self.config.output_dir, &identity.title);

        let state = layout.scan();
        debug!(?state, "existing artifacts");

        if state.final_output {
            let path = layout.final_output();
            info!(path = %path.display(), "final output already exists");
            return Ok(Outcome::AlreadyComplete(path));
        }

        if state.decryption_complete(self.config.require_audio) {
            info!("decrypted tracks already on disk, skipping discovery");
            self.mux_decrypted(&layout).await?;
            return Ok(Outcome::Completed(layout.final_output()));
        }

        if !state.raw_video && !state.decrypted_video {
            // A lone video file means the combined download was cut short; rerun it.
            let found = layout.locate_intermediates().stage(Stage::Download)?;
            if let Some(found) = found.filter(|found| found.audio.is_some()) {
                info!(video = %found.video.display(), "downloaded tracks already on disk, skipping discovery");
                self.mux_intermediates(&layout, found).await?;
                return Ok(Outcome::Completed(layout.final_output()));
            }
        }

        let stream = self
            .catalog
            .stream_info(&identity)
            .await
            .stage(Stage::Discover)?;
        info!(
            transport = %stream.transport,
            drm = stream.drm_protected,
            url = %stream.url,
            "discovered stream"
        );

        let protection = self
            .protection(&identity, &stream)
            .await
            .stage(Stage::Discover)?;

        match protection {
            Protection::Protected(pssh) => {
                self.acquire_protected(&identity, &layout, &stream, &pssh)
                    .await?
            }
            Protection::Unprotected => self.acquire_unprotected(&layout, &stream).await?,
        }

        let path = layout.final_output();
        info!(path = %path.display(), "finished");
        Ok(Outcome::Completed(path))
    }

    async fn protection(
        &self,
        identity: &ContentIdentity,
        stream: &StreamDescriptor,
    ) -> Result<Protection, Error> {
        let mut extracted = None;

        if stream.drm_protected && stream.transport == Transport::Dash {
            let manifest = self.catalog.fetch_manifest(identity, &stream.url).await;
            match manifest.and_then(|m| extract_pssh(&m)) {
                Ok(pssh) => extracted = pssh,
                Err(Error::ProtectionMetadataUnavailable(reason)) => {
                    warn!(%reason, "could not read protection metadata");
                }
                Err(e) => return Err(e),
            }
        }

        resolve_protection(
            stream.drm_protected,
            extracted,
            self.config.pssh_override.as_ref(),
            self.config.missing_pssh,
        )
    }

    async fn acquire_protected(
        &self,
        identity: &ContentIdentity,
        layout: &ArtifactLayout,
        stream: &StreamDescriptor,
        pssh: &Pssh,
    ) -> Result<(), PipelineError> {
        let state = layout.scan();
        let need_video = state.needs_video_download();
        let need_audio = state.needs_audio_download(self.config.require_audio);

        if need_video || need_audio {
            let selection = self
                .choose_formats(&stream.url, need_audio && self.config.require_audio)
                .await
                .stage(Stage::Select)?;

            if need_video {
                self.download_track(&stream.url, &selection.video.id, &layout.raw_video())
                    .await
                    .stage(Stage::Download)?;
            }

            if need_audio {
                match &selection.audio {
                    Some(audio) => self
                        .download_track(&stream.url, &audio.id, &layout.raw_audio())
                        .await
                        .stage(Stage::Download)?,
                    None => warn!("no audio track in a configured language, continuing with video only"),
                }
            }
        }

        self.decrypt_tracks(identity, layout, pssh).await?;
        self.mux_decrypted(layout).await
    }

    async fn choose_formats(
        &self,
        manifest_url: &str,
        require_audio: bool,
    ) -> Result<FormatSelection, Error> {
        let report = self
            .tools
            .list_formats(manifest_url)
            .await
            .map_err(|e| Error::DownloadFailed(format!("format probe: {e}")))?;

        let candidates = parse_report(&report, &self.config.languages);
        debug!(count = candidates.len(), "parsed format report");

        let selection = select_formats(&candidates, require_audio)?;
        info!(
            video = %selection.video.id,
            audio = selection.audio.as_ref().map_or("none", |a| a.id.as_str()),
            "selected formats"
        );
        Ok(selection)
    }

    async fn download_track(
        &self,
        manifest_url: &str,
        format_id: &str,
        output: &Path,
    ) -> Result<(), Error> {
        info!(format = %format_id, path = %output.display(), "downloading track");

        self.tools
            .download_format(manifest_url, format_id, output)
            .await
            .map_err(|e| Error::DownloadFailed(e.to_string()))?;

        if !output.is_file() {
            return Err(Error::MissingArtifact(output.to_path_buf()));
        }
        Ok(())
    }

    /**
        Decrypt every track whose raw file is present and whose decrypted
        file is not. A key is only requested if there is such a track.
    */
    async fn decrypt_tracks(
        &self,
        identity: &ContentIdentity,
        layout: &ArtifactLayout,
        pssh: &Pssh,
    ) -> Result<(), PipelineError> {
        let mut pending = Vec::new();
        for (raw, decrypted) in [
            (layout.raw_video(), layout.decrypted_video()),
            (layout.raw_audio(), layout.decrypted_audio()),
        ] {
            if decrypted.is_file() {
                remove_artifact(&raw).await;
            } else if raw.is_file() {
                pending.push((raw, decrypted));
            }
        }

        if pending.is_empty() {
            return Ok(());
        }

        let request =
            LicenseRequest::new(identity, pssh, &self.config.sessions).stage(Stage::License)?;
        let keys = self
            .keys
            .acquire_key(&request)
            .await
            .stage(Stage::License)?;
        info!(count = keys.len(), "acquired decryption keys");

        for (raw, decrypted) in pending {
            self.decrypt_track(&keys, &raw, &decrypted)
                .await
                .stage(Stage::Decrypt)?;
        }
        Ok(())
    }

    async fn decrypt_track(
        &self,
        keys: &DecryptionKey,
        raw: &Path,
        decrypted: &Path,
    ) -> Result<(), Error> {
        let staging = staging_path(decrypted);
        info!(input = %raw.display(), "decrypting track");

        if let Err(e) = self.tools.decrypt(keys, raw, &staging).await {
            remove_artifact(&staging).await;
            return Err(Error::DecryptionFailed(e.to_string()));
        }

        if !promote(&staging, decrypted).await? {
            return Err(Error::MissingArtifact(staging));
        }
        remove_artifact(raw).await;
        Ok(())
    }

    async fn mux_decrypted(&self, layout: &ArtifactLayout) -> Result<(), PipelineError> {
        for (raw, decrypted) in [
            (layout.raw_video(), layout.decrypted_video()),
            (layout.raw_audio(), layout.decrypted_audio()),
        ] {
            if decrypted.is_file() {
                remove_artifact(&raw).await;
            }
        }

        let video = layout.decrypted_video();
        if !video.is_file() {
            return Err(Error::MissingArtifact(video)).stage(Stage::Mux);
        }

        let audio = layout.decrypted_audio();
        let audio = if audio.is_file() {
            Some(audio)
        } else if self.config.require_audio {
            return Err(Error::MissingArtifact(audio)).stage(Stage::Mux);
        } else {
            None
        };

        self.mux(&video, audio.as_deref(), &layout.final_output())
            .await
            .stage(Stage::Mux)
    }

    async fn acquire_unprotected(
        &self,
        layout: &ArtifactLayout,
        stream: &StreamDescriptor,
    ) -> Result<(), PipelineError> {
        let template = layout.combined_template();
        info!(template = %template.display(), "downloading unprotected stream");

        self.tools
            .download_combined(&stream.url, &template)
            .await
            .map_err(|e| Error::DownloadFailed(e.to_string()))
            .stage(Stage::Download)?;

        let found = layout
            .locate_intermediates()
            .and_then(|found| found.ok_or(Error::MissingArtifact(template)))
            .stage(Stage::Download)?;

        self.mux_intermediates(layout, found).await
    }

    async fn mux_intermediates(
        &self,
        layout: &ArtifactLayout,
        found: Intermediates,
    ) -> Result<(), PipelineError> {
        if found.audio.is_none() {
            if self.config.require_audio {
                return Err(Error::MissingArtifact(layout.combined_template()))
                    .stage(Stage::Download);
            }
            warn!("no audio track downloaded, continuing with video only");
        }

        self.mux(&found.video, found.audio.as_deref(), &layout.final_output())
            .await
            .stage(Stage::Mux)
    }

    /**
        Mux into a staging file, move it into place, then drop the inputs.
    */
    async fn mux(&self, video: &Path, audio: Option<&Path>, output: &Path) -> Result<(), Error> {
        let staging = staging_path(output);
        info!(output = %output.display(), with_audio = audio.is_some(), "muxing");

        if let Err(e) = self.tools.mux(video, audio, &staging).await {
            remove_artifact(&staging).await;
            return Err(Error::MuxFailed(e.to_string()));
        }

        if !promote(&staging, output).await? {
            return Err(Error::MissingArtifact(staging));
        }

        remove_artifact(video).await;
        if let Some(audio) = audio {
            remove_artifact(audio).await;
        }
        Ok(())
    }
}
