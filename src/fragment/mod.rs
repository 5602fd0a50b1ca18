//! Fragment stream decoding.
//!
//! A decompressed scene file is a flat run of typed, variable-length binary
//! records ("fragments"). Fragments reference each other by 1-based
//! position in file order, and only backwards, so this module does nothing
//! but produce the ordered fragment table; wiring references together is
//! the resolver's job.
//!
//! Record layout: `{size:u32, type_tag:u32, name_ref:i32, payload}` where
//! `size` counts the name_ref field plus the payload. A negative name_ref
//! is an offset into the file's obfuscated string hash; zero and positive
//! values leave the fragment anonymous.

pub mod decode;

use log::warn;

use crate::cursor::Cursor;
use crate::error::{Error, Result};
pub use decode::{
    ActorDef, FragmentKind, LightDef, LightPlacement, LightRef, MaterialDef, MaterialList,
    MeshGeometry, MeshRef, ObjectInstance, Polygon, Run, TextureList, TextureListRef,
    TextureSource, POLYGON_PASSABLE,
};

/// Magic value of every scene file.
pub const SCENE_MAGIC: u32 = 0x5450_3D02;

/// XOR key obfuscating the string hash and all embedded filename strings.
pub const STRING_KEY: [u8; 8] = [0x95, 0x3A, 0xC5, 0x2A, 0x95, 0x7A, 0x95, 0x6A];

/// Scene file format generation. The two differ in how mesh texture
/// coordinates are packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    /// Original release format (i16 texture coordinates).
    Old,
    /// Later client format (f32 texture coordinates).
    New,
}

impl Version {
    fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            0x0001_5500 => Ok(Version::Old),
            0x1000_C800 => Ok(Version::New),
            other => Err(Error::UnsupportedVersion { version: other }),
        }
    }
}

/// Decode an XOR-obfuscated byte run (string hash or embedded filename).
pub fn decrypt_strings(data: &[u8]) -> Vec<u8> {
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ STRING_KEY[i % STRING_KEY.len()])
        .collect()
}

/// The decoded string hash: null-separated names addressed by byte offset.
pub struct StringHash(Vec<u8>);

impl StringHash {
    pub fn new(encoded: &[u8]) -> Self {
        Self(decrypt_strings(encoded))
    }

    /// Resolve a fragment name reference. Negative values index into the
    /// hash; everything else is anonymous.
    pub fn name(&self, name_ref: i32) -> Option<String> {
        if name_ref >= 0 {
            return None;
        }
        let offset = (-name_ref) as usize;
        let bytes = self.0.get(offset..)?;
        let end = bytes.iter().position(|&b| b == 0)?;
        String::from_utf8(bytes[..end].to_vec()).ok()
    }
}

/// One record of the fragment table.
pub struct Fragment {
    pub tag: u32,
    pub name: Option<String>,
    pub kind: FragmentKind,
}

/// The ordered fragment table of one scene file.
pub struct FragmentFile {
    pub version: Version,
    pub fragments: Vec<Fragment>,
    /// The file's decoded string hash. Object instances reference actor
    /// definitions by name when the definition lives in another file, so
    /// the resolver needs it beyond parse time.
    pub strings: StringHash,
    /// Fragments with a tag this decoder does not recognize, kept opaque.
    pub unrecognized: usize,
    /// Fragments whose payload was shorter than their declared size,
    /// kept opaque.
    pub truncated: usize,
    /// Texture-list fragments whose count field was not the expected zero.
    pub suspect_texture_lists: usize,
}

impl FragmentFile {
    /// Parse a whole decompressed scene file into a fragment table.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let magic = cursor.read_u32()?;
        if magic != SCENE_MAGIC {
            return Err(Error::BadSceneMagic { found: magic });
        }
        let version = Version::from_raw(cursor.read_u32()?)?;
        let fragment_count = cursor.read_u32()? as usize;
        cursor.skip(8)?; // two header fields with no bearing on decoding
        let hash_size = cursor.read_u32()? as usize;
        cursor.skip(4)?;
        let strings = StringHash::new(cursor.read_bytes(hash_size)?);

        let mut fragments = Vec::with_capacity(fragment_count);
        let mut unrecognized = 0;
        let mut truncated = 0;
        let mut suspect_texture_lists = 0;

        for index in 0..fragment_count {
            let size = cursor.read_u32()? as usize;
            let tag = cursor.read_u32()?;
            let record = cursor.read_bytes(size)?;
            if record.len() < 4 {
                warn!("fragment {} (tag {tag:#04x}) is too short for a name field, keeping it opaque", index + 1);
                truncated += 1;
                fragments.push(Fragment {
                    tag,
                    name: None,
                    kind: FragmentKind::Opaque(record.to_vec()),
                });
                continue;
            }
            let mut body = Cursor::new(record);
            let name_ref = body.read_i32()?;
            let name = strings.name(name_ref);
            let payload = &record[4..];

            let kind = match decode::decode(tag, payload, version) {
                Ok(Some(kind)) => {
                    if let FragmentKind::TextureList(list) = &kind {
                        if list.declared_count != 0 {
                            // Every archive observed so far writes zero here
                            // and follows it with a single reference. A
                            // non-zero value may be an unknown record
                            // variant, so it is worth surfacing loudly.
                            warn!(
                                "fragment {} (texture list) declares count {}, decoded as single-reference",
                                index + 1,
                                list.declared_count
                            );
                            suspect_texture_lists += 1;
                        }
                    }
                    kind
                }
                Ok(None) => {
                    unrecognized += 1;
                    FragmentKind::Opaque(payload.to_vec())
                }
                Err(err) => {
                    warn!("fragment {} (tag {tag:#04x}) is malformed, keeping it opaque: {err}", index + 1);
                    truncated += 1;
                    FragmentKind::Opaque(payload.to_vec())
                }
            };

            fragments.push(Fragment { tag, name, kind });
        }

        Ok(Self {
            version,
            fragments,
            strings,
            unrecognized,
            truncated,
            suspect_texture_lists,
        })
    }
}
