//! Integration tests for the marker locator.

use dvkm_harness::locate::{HexAddr, LocateError, MarkerMap, locate_file, locate_image};

const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const STT_OBJECT: u8 = 1;
const STT_FUNC: u8 = 2;

struct Section {
    name: &'static str,
    ty: u32,
    addr: u64,
    data: Vec<u8>,
    link: u32,
}

/// Minimal little-endian ELF64 with the given code sections and symbols.
/// Symbols are `(name, type, section index, value, size)`.
fn build_elf(code: &[(&'static str, u64)], symbols: &[(&str, u8, u16, u64, u64)]) -> Vec<u8> {
    let mut strtab = vec![0u8];
    let mut symtab = vec![0u8; 24];
    for &(name, kind, shndx, value, size) in symbols {
        let name_off = u32::try_from(strtab.len()).unwrap();
        strtab.extend_from_slice(name.as_bytes());
        strtab.push(0);
        symtab.extend_from_slice(&name_off.to_le_bytes());
        symtab.push(0x10 | kind);
        symtab.push(0);
        symtab.extend_from_slice(&shndx.to_le_bytes());
        symtab.extend_from_slice(&value.to_le_bytes());
        symtab.extend_from_slice(&size.to_le_bytes());
    }

    let mut sections = vec![Section {
        name: "",
        ty: 0,
        addr: 0,
        data: Vec::new(),
        link: 0,
    }];
    for &(name, addr) in code {
        sections.push(Section {
            name,
            ty: SHT_PROGBITS,
            addr,
            data: vec![0x90, 0xC3],
            link: 0,
        });
    }
    let strtab_index = u32::try_from(sections.len()).unwrap();
    sections.push(Section {
        name: ".strtab",
        ty: SHT_STRTAB,
        addr: 0,
        data: strtab,
        link: 0,
    });
    sections.push(Section {
        name: ".symtab",
        ty: SHT_SYMTAB,
        addr: 0,
        data: symtab,
        link: strtab_index,
    });
    let shstrndx = u16::try_from(sections.len()).unwrap();
    let mut shstrtab = vec![0u8];
    let mut name_offsets = Vec::new();
    for section in &sections {
        name_offsets.push(u32::try_from(shstrtab.len()).unwrap());
        shstrtab.extend_from_slice(section.name.as_bytes());
        shstrtab.push(0);
    }
    name_offsets.push(u32::try_from(shstrtab.len()).unwrap());
    shstrtab.extend_from_slice(b".shstrtab\0");
    sections.push(Section {
        name: ".shstrtab",
        ty: SHT_STRTAB,
        addr: 0,
        data: shstrtab,
        link: 0,
    });

    let mut out = vec![0u8; 64];
    let mut offsets = Vec::new();
    for section in &sections {
        offsets.push(out.len() as u64);
        out.extend_from_slice(&section.data);
    }
    let sh_off = out.len() as u64;

    out[..4].copy_from_slice(b"\x7fELF");
    out[4] = 2;
    out[5] = 1;
    out[6] = 1;
    out[16..18].copy_from_slice(&2u16.to_le_bytes());
    out[18..20].copy_from_slice(&62u16.to_le_bytes());
    out[40..48].copy_from_slice(&sh_off.to_le_bytes());
    out[58..60].copy_from_slice(&64u16.to_le_bytes());
    out[60..62].copy_from_slice(&u16::try_from(sections.len()).unwrap().to_le_bytes());
    out[62..64].copy_from_slice(&shstrndx.to_le_bytes());

    for (i, section) in sections.iter().enumerate() {
        let mut sh = [0u8; 64];
        sh[0..4].copy_from_slice(&name_offsets[i].to_le_bytes());
        sh[4..8].copy_from_slice(&section.ty.to_le_bytes());
        sh[16..24].copy_from_slice(&section.addr.to_le_bytes());
        sh[24..32].copy_from_slice(&offsets[i].to_le_bytes());
        sh[32..40].copy_from_slice(&(section.data.len() as u64).to_le_bytes());
        sh[40..44].copy_from_slice(&section.link.to_le_bytes());
        out.extend_from_slice(&sh);
    }
    out
}

#[test]
fn finds_markers_sections_and_input() {
    let image = build_elf(
        &[
            (".text", 0x1000),
            (".trigger_bp", 0x2000),
            (".trigger_bp_2", 0x2010),
        ],
        &[
            ("dvkm_trial_entry_marker", STT_FUNC, 2, 0x2000, 2),
            ("dvkm_trial_exit_marker", STT_FUNC, 3, 0x2010, 2),
            ("dvkm_harness_input", STT_OBJECT, 1, 0x4000, 1024),
            ("main", STT_FUNC, 1, 0x1000, 2),
        ],
    );

    let map = locate_image(&image, "synthetic").unwrap();
    assert_eq!(
        map,
        MarkerMap {
            image: "synthetic".to_string(),
            position_independent: false,
            entry_marker: HexAddr(0x2000),
            exit_marker: HexAddr(0x2010),
            input: HexAddr(0x4000),
            input_size: 1024,
            entry_section: Some(HexAddr(0x2000)),
            exit_section: Some(HexAddr(0x2010)),
            text_section: Some(HexAddr(0x1000)),
        }
    );
    assert!(map.sections_match_markers());

    let json: serde_json::Value = serde_json::from_str(&map.to_json().unwrap()).unwrap();
    assert_eq!(json["entry_marker"], "0x2000");
    assert_eq!(json["input_size"], 1024);
    let back: MarkerMap = serde_json::from_value(json).unwrap();
    assert_eq!(back, map);
}

#[test]
fn missing_exit_marker_is_reported_by_name() {
    let image = build_elf(
        &[(".text", 0x1000)],
        &[
            ("dvkm_trial_entry_marker", STT_FUNC, 1, 0x1000, 2),
            ("dvkm_harness_input", STT_OBJECT, 1, 0x4000, 1024),
        ],
    );
    let err = locate_image(&image, "partial").unwrap_err();
    assert!(matches!(
        err,
        LocateError::MissingSymbol("dvkm_trial_exit_marker")
    ));
    assert!(err.to_string().contains("dvkm_trial_exit_marker"));
}

#[test]
fn undefined_marker_reference_does_not_count() {
    let image = build_elf(
        &[(".text", 0x1000)],
        &[
            ("dvkm_trial_entry_marker", STT_FUNC, 0, 0, 0),
            ("dvkm_trial_exit_marker", STT_FUNC, 1, 0x1000, 2),
            ("dvkm_harness_input", STT_OBJECT, 1, 0x4000, 1024),
        ],
    );
    let err = locate_image(&image, "undefined").unwrap_err();
    assert!(matches!(
        err,
        LocateError::MissingSymbol("dvkm_trial_entry_marker")
    ));
}

#[test]
fn marker_sections_are_optional() {
    let image = build_elf(
        &[(".text", 0x1000)],
        &[
            ("dvkm_trial_entry_marker", STT_FUNC, 1, 0x1000, 2),
            ("dvkm_trial_exit_marker", STT_FUNC, 1, 0x1010, 2),
            ("dvkm_harness_input", STT_OBJECT, 1, 0x4000, 1024),
        ],
    );
    let map = locate_image(&image, "no-sections").unwrap();
    assert!(map.entry_section.is_none());
    assert!(!map.sections_match_markers());
}

#[test]
fn position_independent_images_are_flagged() {
    let mut image = build_elf(
        &[(".text", 0x1000)],
        &[
            ("dvkm_trial_entry_marker", STT_FUNC, 1, 0x1000, 2),
            ("dvkm_trial_exit_marker", STT_FUNC, 1, 0x1010, 2),
            ("dvkm_harness_input", STT_OBJECT, 1, 0x4000, 1024),
        ],
    );
    // e_type = ET_DYN
    image[16..18].copy_from_slice(&3u16.to_le_bytes());

    let map = locate_image(&image, "pie").unwrap();
    assert!(map.position_independent);
    let json: serde_json::Value = serde_json::from_str(&map.to_json().unwrap()).unwrap();
    assert_eq!(json["position_independent"], true);
}

/// The test binary links the real markers; their image-relative layout must
/// agree with the runtime layout.
#[test]
#[cfg(target_os = "linux")]
fn locates_markers_in_this_test_binary() {
    let runtime = dvkm_abi::marker_addresses();

    let map = locate_file(std::path::Path::new("/proc/self/exe")).unwrap();
    assert_eq!(map.input_size, 1024);

    let delta = |a: u64, b: u64| a.wrapping_sub(b);
    assert_eq!(
        delta(map.exit_marker.0, map.entry_marker.0),
        delta(runtime.exit as u64, runtime.entry as u64)
    );
    assert_eq!(
        delta(map.input.0, map.entry_marker.0),
        delta(runtime.input as u64, runtime.entry as u64)
    );
    assert!(map.sections_match_markers(), "{map:?}");
}
