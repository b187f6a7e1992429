//! Format detection rules: magic-byte signatures, header heuristics and
//! filename extensions, matched in table order. The first matching rule
//! decides the plugin.

use std::ffi::OsStr;
use std::fmt::{self, Write as _};
use std::path::Path;

use thiserror::Error;

/// Number of leading bytes shown when no signature matches.
pub const SIGNATURE_DUMP_LEN: usize = 4;

/// Exact bytes expected at `offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub offset: usize,
    pub bytes: &'static [u8],
}

impl Segment {
    pub const fn at(offset: usize, bytes: &'static [u8]) -> Self {
        Self { offset, bytes }
    }

    #[inline]
    fn matches(&self, data: &[u8]) -> bool {
        data.get(self.offset..self.offset + self.bytes.len()) == Some(self.bytes)
    }
}

/// Header check for formats without a magic number. Compared by name.
#[derive(Clone, Copy)]
pub struct Heuristic {
    pub name: &'static str,
    pub accepts: fn(&[u8]) -> bool,
}

impl PartialEq for Heuristic {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Heuristic {}

impl fmt::Debug for Heuristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Heuristic").field(&self.name).finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Matcher {
    /// All segments must match, byte for byte.
    Signature(&'static [Segment]),
    /// Data accepted by a header check. Must come after every signature.
    Heuristic(Heuristic),
    /// Filename extension without the dot, compared ASCII case-insensitively.
    Extension(&'static str),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatRule {
    pub matcher: Matcher,
    pub plugin: &'static str,
}

impl FormatRule {
    pub const fn extension(ext: &'static str, plugin: &'static str) -> Self {
        Self {
            matcher: Matcher::Extension(ext),
            plugin,
        }
    }

    pub const fn signature(segments: &'static [Segment], plugin: &'static str) -> Self {
        Self {
            matcher: Matcher::Signature(segments),
            plugin,
        }
    }

    pub const fn heuristic(heuristic: Heuristic, plugin: &'static str) -> Self {
        Self {
            matcher: Matcher::Heuristic(heuristic),
            plugin,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleTableError {
    #[error("extension {extension} maps to both {first} and {second}")]
    AmbiguousExtension {
        extension: String,
        first: &'static str,
        second: &'static str,
    },
    #[error("signature for {plugin} is unreachable, {shadowed_by} always matches first")]
    ShadowedSignature {
        plugin: &'static str,
        shadowed_by: &'static str,
    },
    #[error("signature for {plugin} has no bytes to compare")]
    EmptySignature { plugin: &'static str },
    #[error("signature for {plugin} comes after the {heuristic} heuristic")]
    SignatureAfterHeuristic {
        plugin: &'static str,
        heuristic: &'static str,
    },
}

/// Ordered, validated rule list. Read-only once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<FormatRule>,
}

impl RuleTable {
    /// Validate and wrap `rules`. Order is priority order.
    pub fn new(rules: Vec<FormatRule>) -> Result<Self, RuleTableError> {
        for (i, rule) in rules.iter().enumerate() {
            match rule.matcher {
                Matcher::Extension(ext) => {
                    let clash = rules[..i].iter().find(|earlier| {
                        matches!(earlier.matcher, Matcher::Extension(e) if e.eq_ignore_ascii_case(ext))
                            && earlier.plugin != rule.plugin
                    });
                    if let Some(earlier) = clash {
                        return Err(RuleTableError::AmbiguousExtension {
                            extension: ext.to_ascii_lowercase(),
                            first: earlier.plugin,
                            second: rule.plugin,
                        });
                    }
                }
                Matcher::Signature(segments) => {
                    if segments.iter().all(|s| s.bytes.is_empty()) {
                        return Err(RuleTableError::EmptySignature {
                            plugin: rule.plugin,
                        });
                    }
                    let heuristic = rules[..i].iter().find_map(|earlier| match earlier.matcher {
                        Matcher::Heuristic(h) => Some(h.name),
                        _ => None,
                    });
                    if let Some(heuristic) = heuristic {
                        return Err(RuleTableError::SignatureAfterHeuristic {
                            plugin: rule.plugin,
                            heuristic,
                        });
                    }
                    let shadow = rules[..i].iter().find(|earlier| match earlier.matcher {
                        Matcher::Signature(prior) => implies(segments, prior),
                        Matcher::Extension(_) | Matcher::Heuristic(_) => false,
                    });
                    if let Some(earlier) = shadow {
                        return Err(RuleTableError::ShadowedSignature {
                            plugin: rule.plugin,
                            shadowed_by: earlier.plugin,
                        });
                    }
                }
                Matcher::Heuristic(_) => {}
            }
        }
        Ok(Self { rules })
    }

    /// The table the `AnyImageImporter` ships with.
    pub fn builtin() -> Self {
        Self {
            rules: BUILTIN_RULES.to_vec(),
        }
    }

    pub fn rules(&self) -> &[FormatRule] {
        &self.rules
    }

    /// Plugin for the extension of `path`, if any rule knows it.
    pub fn plugin_for_path(&self, path: &Path) -> Option<&'static str> {
        let ext = path.extension().and_then(OsStr::to_str)?;
        self.plugin_for_extension(ext)
    }

    pub fn plugin_for_extension(&self, ext: &str) -> Option<&'static str> {
        self.rules.iter().find_map(|rule| match rule.matcher {
            Matcher::Extension(e) if e.eq_ignore_ascii_case(ext) => Some(rule.plugin),
            _ => None,
        })
    }

    /// Plugin whose signature or header heuristic accepts `data`, first
    /// rule wins.
    pub fn plugin_for_signature(&self, data: &[u8]) -> Option<&'static str> {
        self.rules.iter().find_map(|rule| match rule.matcher {
            Matcher::Signature(segments) if segments.iter().all(|s| s.matches(data)) => {
                Some(rule.plugin)
            }
            Matcher::Heuristic(h) if (h.accepts)(data) => Some(rule.plugin),
            _ => None,
        })
    }
}

impl Default for RuleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Lowercase hex of the first few bytes, leading zeros kept.
pub fn signature_hex(data: &[u8]) -> String {
    data.iter()
        .take(SIGNATURE_DUMP_LEN)
        .fold(String::with_capacity(SIGNATURE_DUMP_LEN * 2), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
}

/// True if every input matching `later` also matches `earlier`.
fn implies(later: &[Segment], earlier: &[Segment]) -> bool {
    let byte_at = |pos: usize| {
        later.iter().find_map(|s| {
            pos.checked_sub(s.offset)
                .and_then(|rel| s.bytes.get(rel))
                .copied()
        })
    };
    earlier.iter().all(|s| {
        s.bytes
            .iter()
            .enumerate()
            .all(|(i, &b)| byte_at(s.offset + i) == Some(b))
    })
}

/// TGA header size.
const TGA_HEADER_LEN: usize = 18;

/// TGA has no magic. Accept a full header with a known image type, a color
/// map present exactly for the color-mapped types, and a color map starting
/// at entry zero.
fn looks_like_tga(data: &[u8]) -> bool {
    if data.len() < TGA_HEADER_LEN {
        return false;
    }
    let colormap_ok = match data[2] {
        1 | 9 => data[1] == 1,
        2 | 3 | 10 | 11 => data[1] == 0,
        _ => false,
    };
    colormap_ok && data[3] == 0 && data[4] == 0
}

pub const TGA_HEURISTIC: Heuristic = Heuristic {
    name: "tga-header",
    accepts: looks_like_tga,
};

macro_rules! sig {
    ($plugin:literal, $($offset:literal => $bytes:literal),+ $(,)?) => {
        FormatRule::signature(&[$(Segment { offset: $offset, bytes: $bytes }),+], $plugin)
    };
}

macro_rules! ext {
    ($plugin:literal, $ext:literal) => {
        FormatRule::extension($ext, $plugin)
    };
}

const BUILTIN_RULES: &[FormatRule] = &[
    // Signatures, most specific first
    sig!("PngImporter", 0 => b"\x89PNG"),
    sig!("JpegImporter", 0 => b"\xff\xd8\xff"),
    sig!("Jpeg2000Importer", 0 => b"\x00\x00\x00\x0cjP  \r\n\x87\n"),
    sig!("Jpeg2000Importer", 0 => b"\xff\x4f\xff\x51"),
    sig!("KtxImporter", 0 => b"\xabKTX 20\xbb\r\n\x1a\n"),
    sig!("HdrImporter", 0 => b"#?RADIANCE"),
    sig!("HdrImporter", 0 => b"#?RGBE"),
    sig!("DdsImporter", 0 => b"DDS "),
    sig!("GifImporter", 0 => b"GIF87a"),
    sig!("GifImporter", 0 => b"GIF89a"),
    sig!("PsdImporter", 0 => b"8BPS"),
    sig!("TiffImporter", 0 => b"II\x2a\x00"),
    sig!("TiffImporter", 0 => b"MM\x00\x2a"),
    sig!("OpenExrImporter", 0 => b"\x76\x2f\x31\x01"),
    sig!("WebPImporter", 0 => b"RIFF", 8 => b"WEBP"),
    sig!("BmpImporter", 0 => b"BM"),
    sig!("BasisImporter", 0 => b"sB"),
    // No magic, checked once every signature failed
    FormatRule::heuristic(TGA_HEURISTIC, "TgaImporter"),
    // Extensions
    ext!("BasisImporter", "basis"),
    ext!("BmpImporter", "bmp"),
    ext!("DdsImporter", "dds"),
    ext!("OpenExrImporter", "exr"),
    ext!("GifImporter", "gif"),
    ext!("HdrImporter", "hdr"),
    ext!("IcoImporter", "ico"),
    ext!("IcoImporter", "cur"),
    ext!("JpegImporter", "jpg"),
    ext!("JpegImporter", "jpeg"),
    ext!("JpegImporter", "jpe"),
    ext!("Jpeg2000Importer", "jp2"),
    ext!("KtxImporter", "ktx2"),
    ext!("MngImporter", "mng"),
    ext!("PbmImporter", "pbm"),
    ext!("PcxImporter", "pcx"),
    ext!("PgmImporter", "pgm"),
    ext!("PicImporter", "pic"),
    ext!("PnmImporter", "pnm"),
    ext!("PngImporter", "png"),
    ext!("PpmImporter", "ppm"),
    ext!("PsdImporter", "psd"),
    ext!("SgiImporter", "sgi"),
    ext!("SgiImporter", "bw"),
    ext!("SgiImporter", "rgb"),
    ext!("SgiImporter", "rgba"),
    ext!("TiffImporter", "tif"),
    ext!("TiffImporter", "tiff"),
    ext!("TgaImporter", "tga"),
    ext!("TgaImporter", "vda"),
    ext!("TgaImporter", "icb"),
    ext!("TgaImporter", "vst"),
    ext!("WebPImporter", "webp"),
];

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn builtin_table_is_valid() {
        let table = RuleTable::new(BUILTIN_RULES.to_vec()).expect("builtin rules validate");
        assert_eq!(table, RuleTable::builtin());
    }

    #[rstest]
    #[case(b"\x89PNG\r\n\x1a\n....", "PngImporter")]
    #[case(b"\xff\xd8\xff\xe0", "JpegImporter")]
    #[case(b"\x00\x00\x00\x0cjP  \r\n\x87\n\x00", "Jpeg2000Importer")]
    #[case(b"\xabKTX 20\xbb\r\n\x1a\n", "KtxImporter")]
    #[case(b"#?RADIANCE\n", "HdrImporter")]
    #[case(b"#?RGBE\n", "HdrImporter")]
    #[case(b"DDS \x7c\x00\x00\x00", "DdsImporter")]
    #[case(b"BM\x36\x00", "BmpImporter")]
    #[case(b"GIF89a", "GifImporter")]
    #[case(b"8BPS\x00\x01", "PsdImporter")]
    #[case(b"II\x2a\x00\x08", "TiffImporter")]
    #[case(b"MM\x00\x2a\x00", "TiffImporter")]
    #[case(b"sB\x13\x00", "BasisImporter")]
    #[case(b"\x76\x2f\x31\x01\x02", "OpenExrImporter")]
    #[case(b"RIFF\x24\x00\x00\x00WEBPVP8 ", "WebPImporter")]
    #[case(b"\x00\x00\x0a\x00\x00\x00\x00\x00\x00\x00\x00\x00\x03\x00\x02\x00\x18\x00", "TgaImporter")]
    #[case(b"\x00\x01\x01\x00\x00\x02\x00\x18\x00\x00\x00\x00\x01\x00\x01\x00\x08\x00", "TgaImporter")]
    fn detects_signature(#[case] data: &[u8], #[case] plugin: &str) {
        assert_eq!(RuleTable::builtin().plugin_for_signature(data), Some(plugin));
    }

    #[rstest]
    #[case(b"\x25\x3a\x00\x56 blablabla")]
    #[case(b"\x00\xff\x00\xff")]
    #[case(b"\x33")]
    #[case(b"\x00")]
    #[case(b"DDS!")]
    #[case(b"II\x2a")]
    #[case(b"MM\xff\x2a")]
    #[case(b"\xabKTX 30\xbb\r\n\x1a\n")]
    #[case(b"RIFF\x24\x00\x00\x00WAVE")]
    // Truncated TGA header
    #[case(b"\x00\x00\x02\x00\x00\x00\x00\x00\x00\x00")]
    // Color-mapped type without a color map
    #[case(b"\x00\x00\x01\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x00\x01\x00\x08\x00")]
    // Truecolor type with a color map
    #[case(b"\x00\x01\x02\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x00\x01\x00\x18\x00")]
    // Color map not starting at entry zero
    #[case(b"\x00\x01\x09\x05\x00\x02\x00\x18\x00\x00\x00\x00\x01\x00\x01\x00\x08\x00")]
    // Unknown image type
    #[case(b"\x00\x00\x20\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x00\x01\x00\x18\x00")]
    fn rejects_unknown_signature(#[case] data: &[u8]) {
        assert_eq!(RuleTable::builtin().plugin_for_signature(data), None);
    }

    #[rstest]
    #[case(b"\x25\x3a\x00\x56 blablabla", "253a0056")]
    #[case(b"\x00\xff\x00\xff", "00ff00ff")]
    #[case(b"\x33", "33")]
    #[case(b"\x00", "00")]
    #[case(b"DDS!", "44445321")]
    #[case(b"II\x2a", "49492a")]
    #[case(b"MM\xff\x2a", "4d4dff2a")]
    #[case(b"\xabKTX 30\xbb\r\n\x1a\n", "ab4b5458")]
    fn hex_keeps_leading_zeros(#[case] data: &[u8], #[case] hex: &str) {
        assert_eq!(signature_hex(data), hex);
    }

    #[rstest]
    #[case("rgb.png", Some("PngImporter"))]
    #[case("gray.jpg", Some("JpegImporter"))]
    #[case("uppercase.JPG", Some("JpegImporter"))]
    #[case("photo.JpEg", Some("JpegImporter"))]
    #[case("dir.tga/image.tiff", Some("TiffImporter"))]
    #[case("pngs.ico", Some("IcoImporter"))]
    #[case("image.ktx2", Some("KtxImporter"))]
    #[case("image.xcf", None)]
    #[case("README", None)]
    #[case(".png", None)]
    fn detects_extension(#[case] path: &str, #[case] plugin: Option<&str>) {
        assert_eq!(RuleTable::builtin().plugin_for_path(Path::new(path)), plugin);
    }

    #[test]
    fn rejects_ambiguous_extension() {
        let err = RuleTable::new(vec![
            FormatRule::extension("img", "FirstImporter"),
            FormatRule::extension("IMG", "SecondImporter"),
        ])
        .expect_err("ambiguous");
        assert_eq!(
            err,
            RuleTableError::AmbiguousExtension {
                extension: "img".into(),
                first: "FirstImporter",
                second: "SecondImporter",
            }
        );
    }

    #[test]
    fn duplicate_extension_for_same_plugin_is_fine() {
        RuleTable::new(vec![
            FormatRule::extension("img", "FirstImporter"),
            FormatRule::extension("img", "FirstImporter"),
        ])
        .expect("not ambiguous");
    }

    #[test]
    fn rejects_shadowed_signature() {
        static SHORT: [Segment; 1] = [Segment::at(0, b"BM")];
        static LONG: [Segment; 1] = [Segment::at(0, b"BMP!")];
        let err = RuleTable::new(vec![
            FormatRule::signature(&SHORT, "Short"),
            FormatRule::signature(&LONG, "Long"),
        ])
        .expect_err("shadowed");
        assert_eq!(
            err,
            RuleTableError::ShadowedSignature {
                plugin: "Long",
                shadowed_by: "Short",
            }
        );

        // Most specific first is accepted and both stay reachable.
        let table = RuleTable::new(vec![
            FormatRule::signature(&LONG, "Long"),
            FormatRule::signature(&SHORT, "Short"),
        ])
        .expect("valid order");
        assert_eq!(table.plugin_for_signature(b"BMP!x"), Some("Long"));
        assert_eq!(table.plugin_for_signature(b"BMx"), Some("Short"));
    }

    #[test]
    fn offset_segments_must_all_match() {
        static RIFFISH: [Segment; 2] = [Segment::at(0, b"RIFF"), Segment::at(8, b"ABCD")];
        static OTHER: [Segment; 1] = [Segment::at(8, b"ABCD")];
        // OTHER only constrains offset 8, RIFFISH is more specific and first.
        let table = RuleTable::new(vec![
            FormatRule::signature(&RIFFISH, "Riff"),
            FormatRule::signature(&OTHER, "Other"),
        ])
        .expect("valid");
        assert_eq!(table.plugin_for_signature(b"RIFF0000ABCD"), Some("Riff"));
        assert_eq!(table.plugin_for_signature(b"XXXX0000ABCD"), Some("Other"));
        assert_eq!(table.plugin_for_signature(b"RIFF0000"), None);
    }

    #[test]
    fn rejects_signature_after_heuristic() {
        static DDS: [Segment; 1] = [Segment::at(0, b"DDS ")];
        assert_eq!(
            RuleTable::new(vec![
                FormatRule::heuristic(TGA_HEURISTIC, "TgaImporter"),
                FormatRule::signature(&DDS, "DdsImporter"),
            ]),
            Err(RuleTableError::SignatureAfterHeuristic {
                plugin: "DdsImporter",
                heuristic: "tga-header",
            })
        );
    }

    #[test]
    fn signatures_before_heuristic_win() {
        static TRUECOLOR: [Segment; 1] = [Segment::at(0, b"\x00\x00\x02")];
        let table = RuleTable::new(vec![
            FormatRule::signature(&TRUECOLOR, "Truecolor"),
            FormatRule::heuristic(TGA_HEURISTIC, "TgaImporter"),
        ])
        .expect("valid");
        let mut header = vec![0u8; TGA_HEADER_LEN];
        header[2] = 2;
        assert_eq!(table.plugin_for_signature(&header), Some("Truecolor"));
        header[2] = 3;
        assert_eq!(table.plugin_for_signature(&header), Some("TgaImporter"));
    }

    #[test]
    fn rejects_empty_signature() {
        static EMPTY: [Segment; 1] = [Segment::at(0, b"")];
        assert_eq!(
            RuleTable::new(vec![FormatRule::signature(&EMPTY, "Nothing")]),
            Err(RuleTableError::EmptySignature { plugin: "Nothing" })
        );
    }
}
