//! Batch pairing of `.card` files with their carrier images.
//!
//! `hero.card` pairs with `hero.png`, then `hero-1.png`, `hero-2.png` and
//! so on until an index is missing.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const CARD_EXT: &str = ".card";
pub const IMAGE_EXT: &str = ".png";

pub fn has_card_ext(file_name: &str) -> bool {
    strip_card_ext(file_name).is_some()
}

fn strip_card_ext(file_name: &str) -> Option<&str> {
    let split = file_name.len().checked_sub(CARD_EXT.len())?;
    let ext = file_name.get(split..)?;
    ext.eq_ignore_ascii_case(CARD_EXT).then(|| &file_name[..split])
}

/// File name without a `.card` extension (any case).
pub fn base_name(file_name: &str) -> &str {
    strip_card_ext(file_name).unwrap_or(file_name)
}

/// Image next to a card file: `<base>.png`.
pub fn image_for(card: &Path) -> PathBuf {
    let name = card
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    card.with_file_name(format!("{}{}", base_name(&name), IMAGE_EXT))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub source: PathBuf,
    pub destination: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub card: PathBuf,
    pub images: Vec<ImagePair>,
}

/// Every `.card` file directly inside `input_dir` with its numbered images,
/// each mapped to the same file name inside `output_dir`.
pub fn discover(input_dir: &Path, output_dir: &Path) -> Result<Vec<Target>> {
    let mut targets = Vec::new();

    for entry in fs::read_dir(input_dir)? {
        let path = entry?.path();
        let name = match path.file_name() {
            Some(n) => n.to_string_lossy().into_owned(),
            None => continue,
        };
        if !has_card_ext(&name) || !path.is_file() {
            continue;
        }

        let base = base_name(&name);
        let mut images = Vec::new();
        for i in 0.. {
            let image_name = if i == 0 {
                format!("{}{}", base, IMAGE_EXT)
            } else {
                format!("{}-{}{}", base, i, IMAGE_EXT)
            };
            let source = input_dir.join(&image_name);
            if !source.is_file() {
                break;
            }
            images.push(ImagePair {
                source,
                destination: output_dir.join(&image_name),
            });
        }

        tracing::debug!(card = %path.display(), images = images.len(), "discovered card");
        targets.push(Target { card: path, images });
    }

    targets.sort_by(|a, b| a.card.cmp(&b.card));
    Ok(targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_extension_is_case_insensitive() {
        assert!(has_card_ext("hero.card"));
        assert!(has_card_ext("hero.CARD"));
        assert!(!has_card_ext("hero.png"));
        assert!(!has_card_ext("card"));
        assert_eq!(base_name("hero.Card"), "hero");
        assert_eq!(base_name("notes.txt"), "notes.txt");
    }

    #[test]
    fn test_image_for_sits_next_to_card() {
        assert_eq!(image_for(Path::new("cards/hero.card")), PathBuf::from("cards/hero.png"));
        assert_eq!(image_for(Path::new("plain")), PathBuf::from("plain.png"));
    }

    #[test]
    fn test_discover_numbered_images() {
        let input = tempfile::tempdir().unwrap();
        let output = Path::new("out");
        for name in ["hero.card", "hero.png", "hero-1.png", "hero-3.png", "lone.card", "other.txt"] {
            fs::write(input.path().join(name), b"").unwrap();
        }

        let targets = discover(input.path(), output).unwrap();
        assert_eq!(targets.len(), 2);

        let hero = &targets[0];
        assert_eq!(hero.card, input.path().join("hero.card"));
        assert_eq!(
            hero.images,
            vec![
                ImagePair {
                    source: input.path().join("hero.png"),
                    destination: output.join("hero.png"),
                },
                ImagePair {
                    source: input.path().join("hero-1.png"),
                    destination: output.join("hero-1.png"),
                },
            ]
        );
        assert!(targets[1].images.is_empty());
    }
}
