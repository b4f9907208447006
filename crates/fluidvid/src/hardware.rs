use std::fmt;
use std::io::{BufRead, Write};
use anyhow::{anyhow, Context, Result};
use log::{debug, error, info};
use tokio::process::Command;

/// GPU vendor as far as encoder selection cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Nvidia,
    Amd,
    Intel,
    Unknown,
}

impl Vendor {
    /// Guess the vendor from a marketing name ("NVIDIA GeForce RTX 3060", "Radeon RX 6600", ...)
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("nvidia") {
            Vendor::Nvidia
        } else if lower.contains("amd") || lower.contains("radeon") || lower.contains("ati technologies") {
            Vendor::Amd
        } else if lower.contains("intel") {
            Vendor::Intel
        } else {
            Vendor::Unknown
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Vendor::Nvidia => "NVIDIA",
            Vendor::Amd => "AMD",
            Vendor::Intel => "INTEL",
            Vendor::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// A detected GPU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceleratorDescriptor {
    pub index: u32,
    pub name: String,
    pub vendor: Vendor,
    /// Reported by a working NVIDIA driver, so NVENC can actually be opened
    pub nvenc: bool,
}

impl AcceleratorDescriptor {
    /// One-line summary used in the dashboard header
    pub fn summary(&self) -> String {
        format!("GPU {}: {} ({})", self.index, self.name, self.vendor)
    }
}

/// Header text for an optional selection
pub fn hardware_summary(selected: Option<&AcceleratorDescriptor>) -> String {
    selected
        .map(AcceleratorDescriptor::summary)
        .unwrap_or_else(|| "No GPU detected".to_string())
}

/// Output container of a transcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    Mp4,
    Webm,
}

impl Codec {
    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Mp4 => "mp4",
            Codec::Webm => "webm",
        }
    }
}

/// Resolved encoder settings for one codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderProfile {
    pub codec: Codec,
    pub encoder: String,
    pub params: Vec<String>,
    pub description: String,
}

impl EncoderProfile {
    fn new(codec: Codec, encoder: &str, params: &[&str], description: impl Into<String>) -> Self {
        Self {
            codec,
            encoder: encoder.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            description: description.into(),
        }
    }
}

/// One profile per codec
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderProfiles {
    pub mp4: EncoderProfile,
    pub webm: EncoderProfile,
}

impl EncoderProfiles {
    pub fn profile(&self, codec: Codec) -> &EncoderProfile {
        match codec {
            Codec::Mp4 => &self.mp4,
            Codec::Webm => &self.webm,
        }
    }
}

/// Map an optional accelerator to encoder settings.
///
/// Only mp4 has a hardware path (NVENC); webm is always libvpx-vp9 on the CPU.
/// An NVIDIA card seen only on the bus has no usable driver and stays on x264.
pub fn resolve_encoder_profiles(selected: Option<&AcceleratorDescriptor>) -> EncoderProfiles {
    let mp4 = match selected {
        Some(gpu) if gpu.vendor == Vendor::Nvidia && gpu.nvenc => EncoderProfile::new(
            Codec::Mp4,
            "h264_nvenc",
            &["-preset", "p6", "-cq", "23"],
            format!("GPU {} (NVENC)", gpu.index),
        ),
        _ => EncoderProfile::new(Codec::Mp4, "libx264", &["-preset", "fast", "-crf", "23"], "x264 (CPU)"),
    };

    EncoderProfiles {
        mp4,
        webm: software_vp9(),
    }
}

fn software_vp9() -> EncoderProfile {
    EncoderProfile::new(Codec::Webm, "libvpx-vp9", &["-speed", "4", "-crf", "32"], "VP9 (CPU)")
}

/// Enumerate GPUs. Never fails: running without acceleration is a normal outcome.
pub async fn detect_accelerators() -> Vec<AcceleratorDescriptor> {
    match probe_nvidia().await {
        Ok(gpus) if !gpus.is_empty() => {
            info!("Detected {} NVIDIA GPU(s) via nvidia-smi", gpus.len());
            return gpus;
        }
        Ok(_) => debug!("nvidia-smi reported no GPUs"),
        Err(e) => debug!("nvidia-smi unavailable: {:#}", e),
    }

    match probe_generic().await {
        Ok(gpus) => {
            info!("Detected {} display adapter(s)", gpus.len());
            gpus
        }
        Err(e) => {
            error!("Could not detect GPUs: {:#}", e);
            Vec::new()
        }
    }
}

async fn probe_nvidia() -> Result<Vec<AcceleratorDescriptor>> {
    let stdout = run_probe("nvidia-smi", &["--query-gpu=index,name", "--format=csv,noheader"]).await?;
    Ok(parse_nvidia_smi(&stdout))
}

async fn probe_generic() -> Result<Vec<AcceleratorDescriptor>> {
    if cfg!(windows) {
        let stdout = run_probe("wmic", &["path", "win32_VideoController", "get", "name"]).await?;
        Ok(parse_wmic(&stdout))
    } else {
        let stdout = run_probe("lspci", &[]).await?;
        Ok(parse_lspci(&stdout))
    }
}

async fn run_probe(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .with_context(|| format!("Failed to execute {}", program))?;

    if !output.status.success() {
        return Err(anyhow!(
            "{} exited with {}: {}",
            program,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Parse `nvidia-smi --query-gpu=index,name --format=csv,noheader`
pub fn parse_nvidia_smi(stdout: &str) -> Vec<AcceleratorDescriptor> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .filter_map(|(pos, line)| {
            let (index, name) = match line.split_once(',') {
                Some((idx, name)) => (idx.trim().parse::<u32>().unwrap_or(pos as u32), name.trim()),
                // older drivers ignore the index column
                None => (pos as u32, line),
            };
            if name.is_empty() {
                return None;
            }
            Some(AcceleratorDescriptor {
                index,
                name: name.to_string(),
                vendor: Vendor::Nvidia,
                nvenc: true,
            })
        })
        .collect()
}

/// Parse `lspci` output, keeping display controllers only
pub fn parse_lspci(stdout: &str) -> Vec<AcceleratorDescriptor> {
    const CLASSES: &[&str] = &["VGA compatible controller", "3D controller", "Display controller"];

    stdout
        .lines()
        .filter_map(|line| {
            let class = CLASSES.iter().find(|c| line.contains(*c))?;
            let after = &line[line.find(*class)? + class.len()..];
            let name = after.trim_start_matches(':').trim();
            (!name.is_empty()).then(|| name.to_string())
        })
        .enumerate()
        .map(|(i, name)| AcceleratorDescriptor {
            index: i as u32,
            vendor: Vendor::from_name(&name),
            name,
            nvenc: false,
        })
        .collect()
}

/// Parse `wmic path win32_VideoController get name`
pub fn parse_wmic(stdout: &str) -> Vec<AcceleratorDescriptor> {
    stdout
        .lines()
        .skip(1) // "Name" header
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .enumerate()
        .map(|(i, name)| AcceleratorDescriptor {
            index: i as u32,
            name: name.to_string(),
            vendor: Vendor::from_name(name),
            nvenc: false,
        })
        .collect()
}

/// Pick one accelerator, asking the operator only when there is a real choice.
///
/// Any answer that is not the index of a listed device picks the first one.
pub fn select_accelerator<R: BufRead, W: Write>(
    gpus: &[AcceleratorDescriptor],
    input: &mut R,
    output: &mut W,
) -> Result<Option<AcceleratorDescriptor>> {
    match gpus {
        [] => return Ok(None),
        [only] => return Ok(Some(only.clone())),
        _ => {}
    }

    writeln!(output, "Multiple GPUs detected:")?;
    for gpu in gpus {
        writeln!(output, "  [{}] {} ({})", gpu.index, gpu.name, gpu.vendor)?;
    }
    write!(output, "Enter the number of the GPU to use (default: first): ")?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer).context("Failed to read GPU selection")?;

    let chosen = answer
        .trim()
        .parse::<u32>()
        .ok()
        .and_then(|idx| gpus.iter().find(|g| g.index == idx));

    Ok(Some(chosen.unwrap_or(&gpus[0]).clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn gpu(index: u32, name: &str, vendor: Vendor) -> AcceleratorDescriptor {
        AcceleratorDescriptor {
            index,
            name: name.to_string(),
            vendor,
            nvenc: vendor == Vendor::Nvidia,
        }
    }

    fn select(gpus: &[AcceleratorDescriptor], answer: &str) -> (Option<AcceleratorDescriptor>, String) {
        let mut input = Cursor::new(answer.as_bytes().to_vec());
        let mut output = Vec::new();
        let chosen = select_accelerator(gpus, &mut input, &mut output).unwrap();
        (chosen, String::from_utf8(output).unwrap())
    }

    #[test]
    fn no_gpu_means_software_for_both_codecs() {
        let (chosen, prompt) = select(&[], "");
        assert!(chosen.is_none());
        assert!(prompt.is_empty());

        let profiles = resolve_encoder_profiles(chosen.as_ref());
        assert_eq!(profiles.mp4.encoder, "libx264");
        assert_eq!(profiles.mp4.params, vec!["-preset", "fast", "-crf", "23"]);
        assert_eq!(profiles.mp4.description, "x264 (CPU)");
        assert_eq!(profiles.webm.encoder, "libvpx-vp9");
        assert_eq!(hardware_summary(None), "No GPU detected");
    }

    #[test]
    fn single_gpu_is_taken_without_prompt() {
        let gpus = [gpu(0, "NVIDIA GeForce RTX 3060", Vendor::Nvidia)];
        let (chosen, prompt) = select(&gpus, "1\n");
        assert_eq!(chosen, Some(gpus[0].clone()));
        assert!(prompt.is_empty(), "no prompt expected, got {:?}", prompt);

        let profiles = resolve_encoder_profiles(chosen.as_ref());
        assert_eq!(profiles.mp4.encoder, "h264_nvenc");
        assert_eq!(profiles.mp4.params, vec!["-preset", "p6", "-cq", "23"]);
        assert_eq!(profiles.mp4.description, "GPU 0 (NVENC)");
    }

    #[test]
    fn multiple_gpus_honour_valid_choice() {
        let gpus = [
            gpu(0, "Intel UHD 770", Vendor::Intel),
            gpu(1, "NVIDIA RTX A2000", Vendor::Nvidia),
        ];
        let (chosen, prompt) = select(&gpus, "1\n");
        assert_eq!(chosen.unwrap().index, 1);
        assert!(prompt.contains("[0] Intel UHD 770 (INTEL)"));
        assert!(prompt.contains("[1] NVIDIA RTX A2000 (NVIDIA)"));
    }

    #[test]
    fn multiple_gpus_fall_back_to_first_on_bad_input() {
        let gpus = [
            gpu(0, "AMD Radeon RX 6600", Vendor::Amd),
            gpu(1, "NVIDIA RTX A2000", Vendor::Nvidia),
        ];
        for answer in ["", "\n", "seven\n", "9\n", "-1\n"] {
            let (chosen, _) = select(&gpus, answer);
            assert_eq!(chosen.unwrap().index, 0, "answer {:?}", answer);
        }
    }

    #[test]
    fn nvidia_seen_only_by_lspci_keeps_software_h264() {
        let gpus = parse_lspci("01:00.0 VGA compatible controller: NVIDIA Corporation TU104 [GeForce RTX 2080] (rev a1)\n");
        assert_eq!(gpus[0].vendor, Vendor::Nvidia);
        assert!(!gpus[0].nvenc);

        let profiles = resolve_encoder_profiles(gpus.first());
        assert_eq!(profiles.mp4.encoder, "libx264");
        assert_eq!(profiles.mp4.description, "x264 (CPU)");
        assert_eq!(hardware_summary(gpus.first()), "GPU 0: NVIDIA Corporation TU104 [GeForce RTX 2080] (rev a1) (NVIDIA)");
    }

    #[test]
    fn non_nvidia_gpu_keeps_software_h264() {
        let amd = gpu(0, "AMD Radeon RX 6600", Vendor::Amd);
        let profiles = resolve_encoder_profiles(Some(&amd));
        assert_eq!(profiles.mp4.encoder, "libx264");
    }

    #[test]
    fn webm_never_depends_on_the_accelerator() {
        let candidates = [
            None,
            Some(gpu(0, "NVIDIA RTX 4090", Vendor::Nvidia)),
            Some(gpu(3, "Intel Arc A380", Vendor::Intel)),
            Some(gpu(1, "Mystery Adapter", Vendor::Unknown)),
        ];
        let baseline = resolve_encoder_profiles(None).webm;
        for selected in &candidates {
            let profiles = resolve_encoder_profiles(selected.as_ref());
            assert_eq!(profiles.webm, baseline);
            assert_eq!(profiles.profile(Codec::Webm).codec, Codec::Webm);
        }
    }

    #[test]
    fn parses_nvidia_smi_rows() {
        let out = "0, NVIDIA GeForce RTX 3060\n1, Tesla T4\n\n";
        let gpus = parse_nvidia_smi(out);
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[1], gpu(1, "Tesla T4", Vendor::Nvidia));
    }

    #[test]
    fn parses_nvidia_smi_name_only() {
        let gpus = parse_nvidia_smi("NVIDIA GeForce GTX 1080\n");
        assert_eq!(gpus, vec![gpu(0, "NVIDIA GeForce GTX 1080", Vendor::Nvidia)]);
    }

    #[test]
    fn parses_lspci_display_controllers() {
        let out = "\
00:00.0 Host bridge: Intel Corporation 12th Gen Core Processor Host Bridge
00:02.0 VGA compatible controller: Intel Corporation Alder Lake-S GT1 [UHD Graphics 770] (rev 0c)
01:00.0 3D controller: NVIDIA Corporation GA106 [GeForce RTX 3060] (rev a1)
02:00.0 Ethernet controller: Realtek Semiconductor Co., Ltd. RTL8125
";
        let gpus = parse_lspci(out);
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[0].index, 0);
        assert_eq!(gpus[0].vendor, Vendor::Intel);
        assert_eq!(gpus[1].index, 1);
        assert_eq!(gpus[1].vendor, Vendor::Nvidia);
        assert!(gpus[1].name.starts_with("NVIDIA Corporation GA106"));
    }

    #[test]
    fn parses_wmic_table() {
        let out = "Name  \r\nNVIDIA GeForce RTX 2070  \r\nAMD Radeon(TM) Graphics\r\n\r\n";
        let gpus = parse_wmic(out);
        assert_eq!(gpus.len(), 2);
        assert_eq!(gpus[0].vendor, Vendor::Nvidia);
        assert_eq!(gpus[1].vendor, Vendor::Amd);
    }

    #[test]
    fn summary_uses_upper_case_vendor() {
        let g = gpu(2, "Tesla T4", Vendor::Nvidia);
        assert_eq!(hardware_summary(Some(&g)), "GPU 2: Tesla T4 (NVIDIA)");
    }
}
