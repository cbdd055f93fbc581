use crate::error::Error;

/**
    Audio language codes in order of preference.

    A code matches a format whose id contains `audio_<code>=` or whose
    report line carries a `[<code>]` tag.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguagePreference {
    pub preferred: Vec<String>,
    pub fallback: Vec<String>,
}

impl Default for LanguagePreference {
    fn default() -> Self {
        Self {
            preferred: vec!["est".to_string(), "et".to_string()],
            fallback: vec!["eng".to_string(), "en".to_string()],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Video,
    Audio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Preferred,
    Fallback,
    Unknown,
}

/**
    One line of the probe report that describes a usable track.

    Video candidates always carry a bitrate.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatCandidate {
    pub id: String,
    pub kind: TrackKind,
    pub bitrate_kbps: Option<u32>,
    pub language: Language,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatSelection {
    pub video: FormatCandidate,
    pub audio: Option<FormatCandidate>,
}

/**
    Parse the downloader's `-F` format table into track candidates.

    Lines that are not tracks, and video lines without a readable bitrate,
    are dropped.
*/
pub fn parse_report(report: &str, languages: &LanguagePreference) -> Vec<FormatCandidate> {
    report
        .lines()
        .filter_map(|line| parse_line(line, languages))
        .collect()
}

fn parse_line(line: &str, languages: &LanguagePreference) -> Option<FormatCandidate> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('[') || is_separator(trimmed) {
        return None;
    }

    let id = trimmed.split_whitespace().next()?;
    if id == "ID" {
        return None;
    }

    if line.contains("video only") {
        let bitrate = column_bitrate(line)?;
        Some(FormatCandidate {
            id: id.to_string(),
            kind: TrackKind::Video,
            bitrate_kbps: Some(bitrate),
            language: Language::Unknown,
        })
    } else if line.contains("audio only") {
        Some(FormatCandidate {
            id: id.to_string(),
            kind: TrackKind::Audio,
            bitrate_kbps: column_bitrate(line),
            language: classify_language(id, line, languages),
        })
    } else {
        None
    }
}

fn is_separator(line: &str) -> bool {
    line.chars()
        .all(|c| matches!(c, '-' | '─' | '━' | '|' | '│' | ' '))
}

/// First `<int>k` token of the second table column (TBR).
fn column_bitrate(line: &str) -> Option<u32> {
    let column = line.split(['|', '│']).nth(1)?;
    column
        .split_whitespace()
        .find_map(|token| token.strip_suffix('k')?.parse().ok())
}

fn classify_language(id: &str, line: &str, languages: &LanguagePreference) -> Language {
    let id = id.to_ascii_lowercase();
    let matches = |codes: &[String]| {
        codes.iter().any(|code| {
            let code = code.to_ascii_lowercase();
            id.contains(&format!("audio_{code}=")) || line.contains(&format!("[{code}]"))
        })
    };

    if matches(&languages.preferred) {
        Language::Preferred
    } else if matches(&languages.fallback) {
        Language::Fallback
    } else {
        Language::Unknown
    }
}

/**
    Pick the highest-bitrate video and the best audio in the preferred,
    then the fallback language.
*/
pub fn select_formats(
    candidates: &[FormatCandidate],
    require_audio: bool,
) -> Result<FormatSelection, Error> {
    let video = candidates
        .iter()
        .filter(|c| c.kind == TrackKind::Video)
        .max_by(|a, b| {
            a.bitrate_kbps
                .cmp(&b.bitrate_kbps)
                .then_with(|| a.id.cmp(&b.id))
        })
        .cloned()
        .ok_or(Error::VideoNotFound)?;

    let audio = [Language::Preferred, Language::Fallback]
        .into_iter()
        .find_map(|language| {
            candidates
                .iter()
                .filter(|c| c.kind == TrackKind::Audio && c.language == language)
                .max_by_key(|c| c.bitrate_kbps)
                .cloned()
        });

    if audio.is_none() && require_audio {
        return Err(Error::AudioNotFound);
    }

    Ok(FormatSelection { video, audio })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = include_str!("fixtures/yt_dlp_table.txt");
    const LEGACY: &str = include_str!("fixtures/yt_dlp_legacy.txt");
    const ISM: &str = include_str!("fixtures/yt_dlp_ism.txt");

    fn select(report: &str, require_audio: bool) -> Result<FormatSelection, Error> {
        select_formats(
            &parse_report(report, &LanguagePreference::default()),
            require_audio,
        )
    }

    #[test]
    fn test_table_report() {
        let candidates = parse_report(TABLE, &LanguagePreference::default());
        assert_eq!(candidates.len(), 5);

        let selection = select(TABLE, true).unwrap();
        assert_eq!(selection.video.id, "video=1500000");
        assert_eq!(selection.video.bitrate_kbps, Some(1500));

        let audio = selection.audio.unwrap();
        assert_eq!(audio.id, "audio_est=128000");
        assert_eq!(audio.language, Language::Preferred);
    }

    #[test]
    fn test_legacy_report() {
        let candidates = parse_report(LEGACY, &LanguagePreference::default());
        assert!(!candidates.iter().any(|c| c.id == "video=broken"));

        let rus = candidates.iter().find(|c| c.id == "audio_rus=96000").unwrap();
        assert_eq!(rus.language, Language::Unknown);

        let selection = select(LEGACY, true).unwrap();
        assert_eq!(selection.video.id, "video=2500000");
        assert_eq!(selection.audio.unwrap().id, "audio_est=96000");
    }

    #[test]
    fn test_smooth_streaming_report() {
        let selection = select(ISM, true).unwrap();
        // Equal bitrates fall back to id ordering.
        assert_eq!(selection.video.id, "video-3000b");

        let audio = selection.audio.unwrap();
        assert_eq!(audio.id, "audio_eng-128");
        assert_eq!(audio.language, Language::Fallback);
    }

    #[test]
    fn test_preferred_tag_wins_on_same_line() {
        let line = "audio_eng=1 m4a audio only | 64k dash | audio only [en] [et]";
        let candidate = parse_line(line, &LanguagePreference::default()).unwrap();
        assert_eq!(candidate.language, Language::Preferred);
    }

    #[test]
    fn test_missing_video_is_fatal() {
        let report = "audio_est=1 m4a audio only | 64k dash | audio only [et]";
        assert!(matches!(select(report, true), Err(Error::VideoNotFound)));
    }

    #[test]
    fn test_missing_audio_depends_on_flag() {
        let report = "video=1 mp4 640x360 | 800k dash | avc1 800k video only";
        assert!(matches!(select(report, true), Err(Error::AudioNotFound)));

        let selection = select(report, false).unwrap();
        assert_eq!(selection.video.id, "video=1");
        assert!(selection.audio.is_none());
    }

    #[test]
    fn test_custom_languages() {
        let languages = LanguagePreference {
            preferred: vec!["rus".to_string()],
            fallback: vec![],
        };
        let selection = select_formats(&parse_report(LEGACY, &languages), true).unwrap();
        assert_eq!(selection.audio.unwrap().id, "audio_rus=96000");
    }
}
