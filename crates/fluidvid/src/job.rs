use std::path::{Path, PathBuf};
use crate::hardware::{Codec, EncoderProfile, EncoderProfiles};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Thumbnail,
    Transcode,
}

/// One invocation of the external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub kind: JobKind,
    pub label: String,
    pub height: u32,
    /// Set for transcodes only
    pub profile: Option<EncoderProfile>,
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Inputs shared by every job of a run
#[derive(Debug, Clone)]
pub struct QueueSpec<'a> {
    pub input: &'a Path,
    pub output_dir: &'a Path,
    pub sizes: &'a [u32],
}

/// `video-480p.mp4`
pub fn video_file_name(height: u32, codec: Codec) -> String {
    format!("video-{}p.{}", height, codec.extension())
}

/// `video-480p-poster.jpg`
pub fn poster_file_name(height: u32) -> String {
    format!("video-{}p-poster.jpg", height)
}

/// Jobs produced per configured height
pub const JOBS_PER_SIZE: usize = 3;

/// Expand heights into thumbnail, mp4, webm jobs, in that order, heights in
/// configured order. The result always has `JOBS_PER_SIZE * sizes.len()` entries.
pub fn build_queue(spec: &QueueSpec<'_>, profiles: &EncoderProfiles) -> Vec<Job> {
    let mut jobs = Vec::with_capacity(spec.sizes.len() * JOBS_PER_SIZE);

    for &height in spec.sizes {
        let poster = poster_file_name(height);
        jobs.push(Job {
            kind: JobKind::Thumbnail,
            label: format!("Thumbnail {}", poster),
            height,
            profile: None,
            input: spec.input.to_path_buf(),
            output: spec.output_dir.join(poster),
        });

        for codec in [Codec::Mp4, Codec::Webm] {
            let profile = profiles.profile(codec);
            jobs.push(Job {
                kind: JobKind::Transcode,
                label: format!("{}p ({})", height, profile.description),
                height,
                profile: Some(profile.clone()),
                input: spec.input.to_path_buf(),
                output: spec.output_dir.join(video_file_name(height, codec)),
            });
        }
    }

    jobs
}

impl Job {
    /// ffmpeg arguments for this job; `thumbnail_at` is the poster seek offset
    pub fn tool_args(&self, thumbnail_at: &str) -> Vec<String> {
        let scale = format!("scale=-2:{}", self.height);
        let mut args: Vec<String> = vec!["-y".into()];

        match (&self.kind, &self.profile) {
            (JobKind::Transcode, Some(profile)) => {
                args.push("-i".into());
                args.push(self.input.display().to_string());
                args.push("-vf".into());
                args.push(scale);
                args.push("-c:v".into());
                args.push(profile.encoder.clone());
                args.extend(profile.params.iter().cloned());
                args.push("-an".into());
            }
            // a transcode without a profile has nothing to encode with; treat it as a grab
            _ => {
                args.push("-ss".into());
                args.push(thumbnail_at.to_string());
                args.push("-i".into());
                args.push(self.input.display().to_string());
                args.push("-frames:v".into());
                args.push("1".into());
                args.push("-vf".into());
                args.push(scale);
            }
        }

        args.push(self.output.display().to_string());
        args
    }
}
