use std::ops::Range;

/// Size of a single tar block.
pub const BLOCK_SIZE: usize = 512;

/// Byte array representing a single block in a tar file.
pub type TarBlock = [u8; BLOCK_SIZE];

/// Number of null bytes terminating an archive (two empty blocks).
pub const END_OF_ARCHIVE_SIZE: usize = 2 * BLOCK_SIZE;

/// Bits of a file mode that end up in the header: setuid, setgid, sticky
/// and the three rwx triplets. Everything above is the file type.
pub const PERMISSION_MASK: u32 = 0o7777;

/// Type flag of a regular file.
pub const TYPE_REGULAR: u8 = b'0';

/// Type flag of a GNU long name record.
pub const TYPE_LONG_LINK: u8 = b'L';

/// Magic written into every header. GNU tar uses the pre-POSIX variant.
pub const MAGIC: &[u8] = b"ustar ";

/// Version written after the magic.
pub const VERSION: &[u8] = b" ";

/// Name of the synthetic member carrying a long file name.
pub const LONG_LINK_NAME: &str = "././@LongLink";

/// Owner and group of the long name record.
pub const LONG_LINK_OWNER: &str = "root";

/// Defaults for entries appended from a stream.
pub mod defaults {
    /// Permissions used when none are declared.
    pub const MODE: u32 = 0o644;
    /// Owner name used when none is declared.
    pub const UNAME: &str = "nobody";
    /// Group name used when none is declared.
    pub const GNAME: &str = "nogroup";
}

/// Definitions for offsets within the tar header format.
///
/// Numbers are stored in null-terminated octal, unless specified
/// otherwise.
pub mod header {
    use super::*;

    // Below are various valid ranges in the header.

    /// Range for the file name
    pub const NAME_RANGE: Range<usize> = 0..100;
    /// Mode of the file as a number
    pub const MODE_RANGE: Range<usize> = 100..108;
    /// Owner UID of the file
    pub const OWNER_RANGE: Range<usize> = 108..116;
    /// Group ID of the file
    pub const GROUP_RANGE: Range<usize> = 116..124;
    /// Size of the file, as an octal null-terminated string.
    ///
    /// Sizes that do not fit eleven octal digits are base 256 (i.e.
    /// binary) encoded behind a 0x80 marker byte.
    pub const SIZE_RANGE: Range<usize> = 124..136;
    /// Modification time in unix timestamp.
    pub const MTIME_RANGE: Range<usize> = 136..148;
    /// Range within a block that contains the checksum
    pub const CHECKSUM_RANGE: Range<usize> = 148..156;
    /// Type of the entry, see TYPE_REGULAR and TYPE_LONG_LINK.
    pub const LINK_TYPE_OFFSET: usize = 156;
    /// Contents of the link if the file is either a symlink or a hard
    /// link. Otherwise empty.
    pub const LINK_NAME_RANGE: Range<usize> = 157..257;
    /// "ustar " magic
    pub const MAGIC_RANGE: Range<usize> = 257..263;
    /// Format version following the magic
    pub const VERSION_RANGE: Range<usize> = 263..265;
    /// Owner name
    pub const UNAME_RANGE: Range<usize> = 265..297;
    /// Group name
    pub const GNAME_RANGE: Range<usize> = 297..329;
    /// Device numbers, only used for device nodes.
    pub const DEVMAJOR_RANGE: Range<usize> = 329..337;
    pub const DEVMINOR_RANGE: Range<usize> = 337..345;
    /// Path prefix. Never filled in by this crate.
    pub const PREFIX_RANGE: Range<usize> = 345..500;
}
