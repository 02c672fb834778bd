//! Minimal ELF64 reader for locating harness symbols and sections.
//!
//! The emulator needs the addresses of the marker functions and of the input
//! region before the guest runs. This reader pulls them out of the built
//! harness image: the file header, the section header table, and the
//! `.symtab`/`.strtab` pair (falling back to `.dynsym`/`.dynstr`).
//!
//! Only little-endian ELF64 is accepted. Every table access is bounds-checked
//! against the input slice.

/// ELF magic bytes: "\x7fELF"
pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

const ELFCLASS64: u8 = 2;
const ELFDATA2LSB: u8 = 1;

/// Error type for ELF parsing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElfError {
    /// Invalid ELF magic bytes
    InvalidMagic,
    /// Unsupported ELF class (not ELF64)
    UnsupportedClass(u8),
    /// Unsupported data encoding (not little-endian)
    UnsupportedEncoding(u8),
    /// Table or string lies outside the file
    InvalidOffset { kind: &'static str, offset: u64 },
    /// Buffer too small for requested operation
    BufferTooSmall { needed: usize, available: usize },
    /// Name is not valid UTF-8 or not NUL-terminated
    InvalidStringIndex(u32),
    /// No symbol table present
    NoSymbolTable,
}

impl core::fmt::Display for ElfError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidMagic => write!(f, "invalid ELF magic"),
            Self::UnsupportedClass(c) => write!(f, "unsupported ELF class: {c}"),
            Self::UnsupportedEncoding(e) => write!(f, "unsupported data encoding: {e}"),
            Self::InvalidOffset { kind, offset } => {
                write!(f, "invalid {kind} offset: {offset:#x}")
            }
            Self::BufferTooSmall { needed, available } => {
                write!(f, "buffer too small: need {needed}, have {available}")
            }
            Self::InvalidStringIndex(idx) => write!(f, "invalid string index: {idx}"),
            Self::NoSymbolTable => write!(f, "no symbol table"),
        }
    }
}

impl std::error::Error for ElfError {}

/// Result type for ELF operations.
pub type ElfResult<T> = Result<T, ElfError>;

/// `e_type` of a fixed-address executable.
pub const ET_EXEC: u16 = 2;
/// `e_type` of a shared object or position-independent executable.
pub const ET_DYN: u16 = 3;

/// The subset of the ELF64 file header needed to walk sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64Header {
    pub e_type: u16,
    pub e_machine: u16,
    pub e_shoff: u64,
    pub e_shentsize: u16,
    pub e_shnum: u16,
    pub e_shstrndx: u16,
}

impl Elf64Header {
    pub const SIZE: usize = 64;

    pub fn parse(data: &[u8]) -> ElfResult<Self> {
        if data.len() < Self::SIZE {
            return Err(ElfError::BufferTooSmall {
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        if data[..4] != ELF_MAGIC {
            return Err(ElfError::InvalidMagic);
        }
        if data[4] != ELFCLASS64 {
            return Err(ElfError::UnsupportedClass(data[4]));
        }
        if data[5] != ELFDATA2LSB {
            return Err(ElfError::UnsupportedEncoding(data[5]));
        }

        Ok(Self {
            e_type: read_u16(data, 16),
            e_machine: read_u16(data, 18),
            e_shoff: read_u64(data, 40),
            e_shentsize: read_u16(data, 58),
            e_shnum: read_u16(data, 60),
            e_shstrndx: read_u16(data, 62),
        })
    }

    /// True for images the loader may place anywhere; symbol values are
    /// then offsets from the load base rather than runtime addresses.
    #[must_use]
    pub const fn is_position_independent(&self) -> bool {
        self.e_type == ET_DYN
    }
}

/// Section header type values this reader cares about.
pub const SHT_SYMTAB: u32 = 2;
pub const SHT_STRTAB: u32 = 3;
pub const SHT_NOBITS: u32 = 8;
pub const SHT_DYNSYM: u32 = 11;

/// ELF64 section header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64SectionHeader {
    pub sh_name: u32,
    pub sh_type: u32,
    pub sh_flags: u64,
    pub sh_addr: u64,
    pub sh_offset: u64,
    pub sh_size: u64,
    pub sh_link: u32,
    pub sh_info: u32,
    pub sh_addralign: u64,
    pub sh_entsize: u64,
}

impl Elf64SectionHeader {
    /// Size of an ELF64 section header in bytes.
    pub const SIZE: usize = 64;

    pub fn parse(data: &[u8]) -> ElfResult<Self> {
        if data.len() < Self::SIZE {
            return Err(ElfError::BufferTooSmall {
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        Ok(Self {
            sh_name: read_u32(data, 0),
            sh_type: read_u32(data, 4),
            sh_flags: read_u64(data, 8),
            sh_addr: read_u64(data, 16),
            sh_offset: read_u64(data, 24),
            sh_size: read_u64(data, 32),
            sh_link: read_u32(data, 40),
            sh_info: read_u32(data, 44),
            sh_addralign: read_u64(data, 48),
            sh_entsize: read_u64(data, 56),
        })
    }
}

/// ELF64 symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Elf64Symbol {
    pub st_name: u32,
    pub st_info: u8,
    pub st_other: u8,
    pub st_shndx: u16,
    pub st_value: u64,
    pub st_size: u64,
}

impl Elf64Symbol {
    pub const SIZE: usize = 24;

    /// `STT_FUNC`
    pub const TYPE_FUNC: u8 = 2;
    /// `STT_OBJECT`
    pub const TYPE_OBJECT: u8 = 1;

    pub fn parse(data: &[u8]) -> ElfResult<Self> {
        if data.len() < Self::SIZE {
            return Err(ElfError::BufferTooSmall {
                needed: Self::SIZE,
                available: data.len(),
            });
        }
        Ok(Self {
            st_name: read_u32(data, 0),
            st_info: data[4],
            st_other: data[5],
            st_shndx: read_u16(data, 6),
            st_value: read_u64(data, 8),
            st_size: read_u64(data, 16),
        })
    }

    #[must_use]
    pub const fn symbol_type(&self) -> u8 {
        self.st_info & 0xf
    }

    #[must_use]
    pub const fn is_defined(&self) -> bool {
        self.st_shndx != 0
    }
}

/// A parsed view over an ELF64 image.
#[derive(Debug, Clone)]
pub struct ElfImage<'a> {
    data: &'a [u8],
    header: Elf64Header,
    sections: Vec<Elf64SectionHeader>,
}

impl<'a> ElfImage<'a> {
    pub fn parse(data: &'a [u8]) -> ElfResult<Self> {
        let header = Elf64Header::parse(data)?;
        let sections = parse_section_headers(data, &header)?;
        Ok(Self {
            data,
            header,
            sections,
        })
    }

    #[must_use]
    pub const fn header(&self) -> &Elf64Header {
        &self.header
    }

    #[must_use]
    pub fn sections(&self) -> &[Elf64SectionHeader] {
        &self.sections
    }

    /// Resolve a section's name through the section-name string table.
    pub fn section_name(&self, section: &Elf64SectionHeader) -> ElfResult<&'a str> {
        let shstrtab = self
            .sections
            .get(usize::from(self.header.e_shstrndx))
            .ok_or(ElfError::InvalidOffset {
                kind: "section name table",
                offset: u64::from(self.header.e_shstrndx),
            })?;
        self.string_at(shstrtab, section.sh_name)
    }

    /// First section named `name`.
    pub fn section_by_name(&self, name: &str) -> ElfResult<Option<&Elf64SectionHeader>> {
        for section in &self.sections {
            if self.section_name(section)? == name {
                return Ok(Some(section));
            }
        }
        Ok(None)
    }

    /// All named symbols of the static symbol table, or the dynamic one if
    /// the image was stripped.
    pub fn symbols(&self) -> ElfResult<Vec<(&'a str, Elf64Symbol)>> {
        let symtab = self
            .sections
            .iter()
            .find(|s| s.sh_type == SHT_SYMTAB)
            .or_else(|| self.sections.iter().find(|s| s.sh_type == SHT_DYNSYM))
            .ok_or(ElfError::NoSymbolTable)?;
        let strtab = self
            .sections
            .get(symtab.sh_link as usize)
            .ok_or(ElfError::InvalidOffset {
                kind: "symbol string table",
                offset: u64::from(symtab.sh_link),
            })?;

        let bytes = self.section_bytes(symtab, "symbol table")?;
        let mut out = Vec::with_capacity(bytes.len() / Elf64Symbol::SIZE);
        for chunk in bytes.chunks_exact(Elf64Symbol::SIZE) {
            let sym = Elf64Symbol::parse(chunk)?;
            if sym.st_name == 0 {
                continue;
            }
            out.push((self.string_at(strtab, sym.st_name)?, sym));
        }
        Ok(out)
    }

    /// First defined symbol named `name`.
    pub fn symbol_by_name(&self, name: &str) -> ElfResult<Option<Elf64Symbol>> {
        let [found] = self.find_symbols([name])?;
        Ok(found)
    }

    /// First defined symbol for each of `names`, from a single pass over the
    /// symbol table.
    pub fn find_symbols<const N: usize>(
        &self,
        names: [&str; N],
    ) -> ElfResult<[Option<Elf64Symbol>; N]> {
        let mut found = [None; N];
        for (name, sym) in self.symbols()? {
            if !sym.is_defined() {
                continue;
            }
            for (slot, wanted) in found.iter_mut().zip(names) {
                if slot.is_none() && name == wanted {
                    *slot = Some(sym);
                }
            }
        }
        Ok(found)
    }

    fn section_bytes(
        &self,
        section: &Elf64SectionHeader,
        kind: &'static str,
    ) -> ElfResult<&'a [u8]> {
        if section.sh_type == SHT_NOBITS {
            return Ok(&[]);
        }
        let start = usize::try_from(section.sh_offset).map_err(|_| ElfError::InvalidOffset {
            kind,
            offset: section.sh_offset,
        })?;
        let end = usize::try_from(section.sh_size)
            .ok()
            .and_then(|size| start.checked_add(size))
            .ok_or(ElfError::InvalidOffset {
                kind,
                offset: section.sh_offset,
            })?;
        self.data.get(start..end).ok_or(ElfError::BufferTooSmall {
            needed: end,
            available: self.data.len(),
        })
    }

    fn string_at(&self, table: &Elf64SectionHeader, index: u32) -> ElfResult<&'a str> {
        let bytes = self.section_bytes(table, "string table")?;
        let tail = bytes
            .get(index as usize..)
            .ok_or(ElfError::InvalidStringIndex(index))?;
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(ElfError::InvalidStringIndex(index))?;
        core::str::from_utf8(&tail[..len]).map_err(|_| ElfError::InvalidStringIndex(index))
    }
}

fn parse_section_headers(
    data: &[u8],
    header: &Elf64Header,
) -> ElfResult<Vec<Elf64SectionHeader>> {
    let shnum = usize::from(header.e_shnum);
    if shnum == 0 {
        return Ok(Vec::new());
    }
    let shentsize = usize::from(header.e_shentsize);
    if shentsize < Elf64SectionHeader::SIZE {
        return Err(ElfError::BufferTooSmall {
            needed: Elf64SectionHeader::SIZE,
            available: shentsize,
        });
    }
    let invalid = ElfError::InvalidOffset {
        kind: "section header table",
        offset: header.e_shoff,
    };
    let shoff = usize::try_from(header.e_shoff).map_err(|_| invalid.clone())?;
    let end = shentsize
        .checked_mul(shnum)
        .and_then(|len| shoff.checked_add(len))
        .ok_or(invalid)?;
    if end > data.len() {
        return Err(ElfError::BufferTooSmall {
            needed: end,
            available: data.len(),
        });
    }

    (0..shnum)
        .map(|i| Elf64SectionHeader::parse(&data[shoff + i * shentsize..]))
        .collect()
}

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn read_u64(buf: &[u8], off: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(raw)
}
