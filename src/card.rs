use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::generate::GenerateOptions;

/// Reads a YAML card holding any subset of the generation options.
pub fn load_card(path: &Path) -> Result<GenerateOptions> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read card {}", path.display()))?;
    parse_card(&contents).map_err(|error| anyhow!("{} in {}", error, path.display()))
}

pub fn parse_card(contents: &str) -> Result<GenerateOptions> {
    if contents.trim().is_empty() {
        return Ok(GenerateOptions::default());
    }
    serde_yaml::from_str(contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!("failed to parse card yaml at {}: {}", location, error)
    })
}

/// Command-line values that take precedence over a card.
#[derive(Debug, Clone, Default)]
pub struct CardOverrides {
    pub msg: Option<String>,
    pub reply: Option<String>,
    pub seed: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub scale: Option<u32>,
}

impl CardOverrides {
    pub fn apply(self, mut options: GenerateOptions) -> GenerateOptions {
        if let Some(msg) = self.msg {
            options.msg = msg;
        }
        if let Some(reply) = self.reply {
            options.reply = Some(reply);
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if let Some(width) = self.width {
            options.width = width;
        }
        if let Some(height) = self.height {
            options.height = height;
        }
        if let Some(scale) = self.scale {
            options.scale = scale;
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::{load_card, parse_card, CardOverrides};
    use crate::generate::GenerateOptions;

    #[test]
    fn partial_card_keeps_defaults() {
        let options = parse_card("msg: deploy on friday\nseed: 7\n").expect("card should parse");
        assert_eq!(options.msg, "deploy on friday");
        assert_eq!(options.seed, 7);
        assert_eq!((options.width, options.height, options.scale), (480, 270, 1));
        assert_eq!(options.reply, None);
    }

    #[test]
    fn empty_card_is_all_defaults() {
        assert_eq!(parse_card("  \n").expect("empty"), GenerateOptions::default());
    }

    #[test]
    fn unknown_field_reports_location() {
        let error = parse_card("msg: hi\nfps: 30\n").expect_err("unknown field must fail");
        let text = error.to_string();
        assert!(text.contains("line 2"), "{text}");
        assert!(text.contains("fps"), "{text}");
    }

    #[test]
    fn missing_file_names_path() {
        let error = load_card(std::path::Path::new("/nonexistent/card.yaml"))
            .expect_err("missing file must fail");
        assert!(format!("{error:#}").contains("/nonexistent/card.yaml"));
    }

    #[test]
    fn overrides_win_over_card_values() {
        let card = parse_card("msg: from card\nwidth: 640\nscale: 2\n").expect("card");
        let merged = CardOverrides {
            msg: Some("from flag".to_owned()),
            scale: Some(3),
            ..CardOverrides::default()
        }
        .apply(card);
        assert_eq!(merged.msg, "from flag");
        assert_eq!(merged.width, 640);
        assert_eq!(merged.scale, 3);
    }
}
