//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Convert a web page into a Markdown bundle with its images, video and audio.
#[derive(Parser, Debug)]
#[command(name = "web2md")]
#[command(author, version, about)]
pub struct Args {
    /// Page to convert: an http(s) URL or a local HTML file
    pub input: String,

    /// Base URL for resolving relative links (defaults to the page URL)
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Directory that receives the timestamped bundle
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// RON configuration file (defaults to ./web2md.ron when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum concurrent media downloads (1-32)
    #[arg(short = 'c', long, value_parser = clap::value_parser!(u8).range(1..=32))]
    pub concurrency: Option<u8>,

    /// CSS selector of the element to convert (main content is detected when nothing matches)
    #[arg(short, long)]
    pub selector: Option<String>,

    /// Keep remote media links instead of downloading them
    #[arg(long)]
    pub no_media: bool,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_is_required() {
        let err = Args::try_parse_from(["web2md"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn defaults_leave_overrides_unset() {
        let args = Args::try_parse_from(["web2md", "https://ex.com/post"]).unwrap();
        assert_eq!(args.input, "https://ex.com/post");
        assert_eq!(args.base_url, None);
        assert_eq!(args.out, None);
        assert_eq!(args.concurrency, None);
        assert_eq!(args.selector, None);
        assert!(!args.no_media);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn flags_are_parsed() {
        let args = Args::try_parse_from([
            "web2md",
            "page.html",
            "--base-url",
            "https://ex.com/",
            "-o",
            "bundles",
            "-c",
            "8",
            "--selector",
            "div.post > section",
            "--no-media",
            "--log-file",
            "run.log",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.base_url.as_deref(), Some("https://ex.com/"));
        assert_eq!(args.out, Some(PathBuf::from("bundles")));
        assert_eq!(args.concurrency, Some(8));
        assert_eq!(args.selector.as_deref(), Some("div.post > section"));
        assert!(args.no_media);
        assert_eq!(args.log_file, Some(PathBuf::from("run.log")));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn concurrency_out_of_range_is_rejected() {
        assert!(Args::try_parse_from(["web2md", "x", "-c", "0"]).is_err());
        assert!(Args::try_parse_from(["web2md", "x", "-c", "33"]).is_err());
    }
}
