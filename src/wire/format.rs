//! Wire scene format constants.
//!
//! The index is a tree of tagged elements with string attributes; values too
//! large to inline are stored in the sibling blob file and the attribute holds
//! the blob offset in decimal.
//!
//! Blob record layout at each offset:
//! ```text
//! [count: u64 LE][count * element_size bytes]
//! ```

use std::path::{Path, PathBuf};

/// Root element of a scene index.
pub const ROOT_TAG: &str = "cycles";

/// Child element holding one socket value.
pub const SOCKET_TAG: &str = "socket";

/// Link record inside a shader element.
pub const CONNECT_TAG: &str = "connect";

/// Geometry or object attribute record.
pub const ATTRIBUTE_TAG: &str = "attribute";

/// Index tags that differ from their registry type name.
pub const BACKGROUND_SHADER_TAG: &str = "background";
pub const BACKGROUND_SHADER_TYPE: &str = "background_shader";

/// Alias resolving to the graph output node inside a shader element.
pub const OUTPUT_ALIAS: &str = "Material Output";

/// Extension appended to the index filename for the blob.
pub const BLOB_EXTENSION: &str = "bin";

/// Size of the count prefix of a blob record.
pub const BLOB_COUNT_SIZE: u64 = 8;

/// Socket record attributes.
pub mod attr {
    pub const NAME: &str = "name";
    pub const UI_NAME: &str = "ui_name";
    pub const VALUE: &str = "value";
    pub const TYPE_NAME: &str = "type_name";

    pub const FROM_NODE: &str = "from_node";
    pub const FROM_SOCKET: &str = "from_socket";
    pub const FROM_SOCKET_UI: &str = "from_socket_ui";
    pub const TO_NODE: &str = "to_node";
    pub const TO_SOCKET: &str = "to_socket";
    pub const TO_SOCKET_UI: &str = "to_socket_ui";

    pub const GEOMETRY_TYPE: &str = "geometry_type";
    pub const STD: &str = "std";
    pub const BASETYPE: &str = "basetype";
    pub const AGGREGATE: &str = "aggregate";
    pub const VECSEMANTICS: &str = "vecsemantics";
    pub const RESERVED: &str = "reserved";
    pub const ARRAYLEN: &str = "arraylen";
    pub const ELEMENT: &str = "element";
    pub const FLAGS: &str = "flags";
    pub const BUFFER: &str = "buffer";
    pub const DATA: &str = "data";
    pub const INTERP: &str = "interp";
    pub const VOLUME_TYPE: &str = "volume_type";

    pub const RAW_DX: &str = "raw_dx";
    pub const RAW_DY: &str = "raw_dy";
    pub const RAW_DZ: &str = "raw_dz";
    pub const SCAL_X: &str = "scal_x";
    pub const SCAL_Y: &str = "scal_y";
    pub const SCAL_Z: &str = "scal_z";
    pub const RAW_TYPE: &str = "raw_type";
    pub const RAW_CHANNELS: &str = "raw_channels";

    pub const CHANNELS: &str = "channels";
    pub const WIDTH: &str = "width";
    pub const HEIGHT: &str = "height";
    pub const TYPE: &str = "type";
    pub const COLORSPACE: &str = "colorspace";

    pub const SRC: &str = "src";
}

/// `volume_type` discriminator values.
pub mod volume_type {
    pub const OPENVDB: &str = "openvdb";
    pub const RAW: &str = "raw";
    pub const NANOVDB: &str = "nanovdb";
    pub const NANOVDB_MULTIRES: &str = "nanovdb_multires";
}

/// Sibling blob path: `<index>.bin`.
pub fn blob_path(index: &Path) -> PathBuf {
    let mut s = index.as_os_str().to_owned();
    s.push(".");
    s.push(BLOB_EXTENSION);
    PathBuf::from(s)
}

/// True if `s` is non-empty and all ASCII digits (a blob offset).
#[inline]
pub fn is_offset(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_path() {
        assert_eq!(blob_path(Path::new("/tmp/scene.json")), PathBuf::from("/tmp/scene.json.bin"));
        assert_eq!(blob_path(Path::new("scene")), PathBuf::from("scene.bin"));
    }

    #[test]
    fn test_is_offset() {
        assert!(is_offset("0"));
        assert!(is_offset("12345"));
        assert!(!is_offset(""));
        assert!(!is_offset("-1"));
        assert!(!is_offset("volume.vdb"));
    }
}
