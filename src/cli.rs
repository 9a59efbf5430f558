// ============================================================================
// ImageStudio CLI — headless generation via command-line arguments
// ============================================================================
//
// Usage examples:
//   imagestudio --prompt "a lighthouse at dusk"
//   imagestudio -p "a fox" -n 4 --aspect-ratio 16:9 --output-dir out/
//   imagestudio -p "make the sky purple" --image photo.png --format jpeg
//
// No GUI is opened in CLI mode. The request runs synchronously on the
// current thread; results are written as imagestudio-<n>.<ext> in the
// output directory.

use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;

use crate::codec::{self, OutputFormat};
use crate::generate::{self, GenerationOutcome, GenerationRequest};
use crate::session::{ASPECT_RATIOS, MAX_IMAGE_COUNT, MIN_IMAGE_COUNT};
use crate::sources;

/// ImageStudio headless generator.
///
/// Generate or edit images from the terminal — no window required.
#[derive(Parser, Debug)]
#[command(
    name = "imagestudio",
    about = "ImageStudio headless image generation",
    long_about = "Run text-to-image or image-to-image requests without opening\n\
                  the GUI. Results are written to the output directory as\n\
                  imagestudio-<n>.<ext>.\n\n\
                  Example:\n  \
                  imagestudio --prompt \"a lighthouse at dusk\" -n 2 --aspect-ratio 16:9\n  \
                  imagestudio --prompt \"make it snow\" --image photo.png"
)]
pub struct CliArgs {
    /// Prompt text. The presence of this flag routes the process into CLI
    /// mode before any window is created.
    #[arg(short, long)]
    pub prompt: String,

    /// Source image(s) for an edit request. Omit for text-to-image.
    #[arg(short, long, value_name = "FILE")]
    pub image: Vec<PathBuf>,

    /// Number of images for text-to-image (1-4). Ignored for edit requests.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u32,

    /// Aspect ratio for text-to-image: 1:1, 16:9, 9:16, 4:3, 3:4.
    #[arg(long, default_value = "1:1", value_name = "W:H")]
    pub aspect_ratio: String,

    /// Output format: png or jpeg.
    #[arg(short, long, default_value = "png")]
    pub format: String,

    /// Directory the result images are written to.
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// API key. Falls back to the GEMINI_API_KEY environment variable.
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Print request timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when the prompt flag is present in the real process
    /// arguments. Used by `main()` to route before creating a window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--prompt" || a == "-p")
    }
}

fn parse_format(raw: &str) -> Option<OutputFormat> {
    match raw.to_ascii_lowercase().as_str() {
        "png" => Some(OutputFormat::Png),
        "jpeg" | "jpg" => Some(OutputFormat::Jpeg),
        _ => None,
    }
}

/// Run the request and return the process exit code: `0` on success, `1` on
/// any failure.
pub fn run(args: CliArgs) -> i32 {
    let Some(api_key) = args
        .api_key
        .clone()
        .or_else(|| std::env::var("GEMINI_API_KEY").ok())
        .filter(|key| !key.trim().is_empty())
    else {
        eprintln!("error: no API key. Pass --api-key or set GEMINI_API_KEY.");
        return 1;
    };

    if args.prompt.trim().is_empty() {
        eprintln!("error: the prompt is empty.");
        return 1;
    }

    let Some(format) = parse_format(&args.format) else {
        eprintln!("error: unknown format {:?} (expected png or jpeg).", args.format);
        return 1;
    };

    let request = if args.image.is_empty() {
        if !ASPECT_RATIOS.contains(&args.aspect_ratio.as_str()) {
            eprintln!(
                "error: unsupported aspect ratio {:?} (expected one of {}).",
                args.aspect_ratio,
                ASPECT_RATIOS.join(", ")
            );
            return 1;
        }
        GenerationRequest::Batch {
            prompt: args.prompt.trim().to_string(),
            count: args.count.clamp(MIN_IMAGE_COUNT, MAX_IMAGE_COUNT),
            aspect_ratio: args.aspect_ratio.clone(),
            output_format: format,
        }
    } else {
        // The CLI was given explicit paths: reject non-image entries loudly
        // instead of silently dropping them like the GUI uploader.
        let filtered = sources::filter_image_files(args.image.clone());
        if filtered.len() != args.image.len() {
            eprintln!("error: one or more --image arguments are not image files.");
            return 1;
        }
        match sources::decode_batch(&filtered) {
            Ok(batch) => GenerationRequest::Edit {
                prompt: args.prompt.trim().to_string(),
                images: batch.into_iter().map(|s| s.payload).collect(),
            },
            Err(e) => {
                eprintln!("error: {}", e);
                return 1;
            }
        }
    };

    let start = Instant::now();
    match generate::run_request(&request, &api_key) {
        Ok(GenerationOutcome::Images(images)) => {
            if let Err(e) = std::fs::create_dir_all(&args.output_dir) {
                eprintln!(
                    "error: cannot create output directory {}: {}",
                    args.output_dir.display(),
                    e
                );
                return 1;
            }
            for (idx, image) in images.iter().enumerate() {
                let converted = match codec::reencode(image, format) {
                    Ok(converted) => converted,
                    Err(e) => {
                        eprintln!("error: {}", e);
                        return 1;
                    }
                };
                let path = args
                    .output_dir
                    .join(format!("imagestudio-{}.{}", idx, format.extension()));
                if let Err(e) = std::fs::write(&path, &converted.bytes) {
                    eprintln!("error: cannot write {}: {}", path.display(), e);
                    return 1;
                }
                println!("{}", path.display());
            }
            if args.verbose {
                println!(
                    "{} image(s) in {:.1}s",
                    images.len(),
                    start.elapsed().as_secs_f32()
                );
            }
            0
        }
        Ok(GenerationOutcome::NoImage { explanation }) => {
            match explanation {
                Some(text) => eprintln!("The service returned no image: {}", text),
                None => eprintln!("The service returned no image."),
            }
            1
        }
        Err(e) => {
            eprintln!("error: {}", e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_gui_initial_state() {
        let args = CliArgs::try_parse_from(["imagestudio", "--prompt", "a cat"]).unwrap();
        assert_eq!(args.count, 1);
        assert_eq!(args.aspect_ratio, "1:1");
        assert_eq!(args.format, "png");
        assert!(args.image.is_empty());
    }

    #[test]
    fn repeated_image_flags_accumulate_in_order() {
        let args = CliArgs::try_parse_from([
            "imagestudio",
            "--prompt",
            "merge these",
            "--image",
            "a.png",
            "--image",
            "b.jpg",
        ])
        .unwrap();
        assert_eq!(
            args.image,
            vec![PathBuf::from("a.png"), PathBuf::from("b.jpg")]
        );
    }

    #[test]
    fn prompt_is_required() {
        assert!(CliArgs::try_parse_from(["imagestudio"]).is_err());
    }

    #[test]
    fn format_parsing_accepts_jpg_alias() {
        assert_eq!(parse_format("jpg"), Some(OutputFormat::Jpeg));
        assert_eq!(parse_format("PNG"), Some(OutputFormat::Png));
        assert_eq!(parse_format("tiff"), None);
    }
}
