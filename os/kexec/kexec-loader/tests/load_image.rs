use device_tree::{Fdt, Node, Property};
use kexec_loader::metadata::{PROP_BOOTARGS, PROP_INITRD_END, PROP_INITRD_START};
use kexec_loader::{
    Arch, BootLayout, ImageKind, InsufficientMemory, KexecLoader, KexecOptions, LoadError,
    LoadResult, MemoryMap, PhysicalAddress, PhysicalRange, RangeType, TypedRange,
};
use log::{Level, Log, Metadata, Record};
use std::io::{self, Read};
use std::sync::Mutex;

const KERNEL_SIZE: usize = 0x00A0_0000;

fn ram_map() -> MemoryMap {
    [TypedRange::ram(0x0010_0000, 0x1010_0000)]
        .into_iter()
        .collect()
}

fn stale_chosen() -> Node {
    Node::new("chosen")
        .with_property(Property::u64(PROP_INITRD_START, 500))
        .with_property(Property::u64(PROP_INITRD_END, 500))
}

fn tree() -> Fdt {
    Fdt::new(Node::root().with_child(stale_chosen()))
}

fn loader() -> KexecLoader {
    KexecLoader::new(Arch::Aarch64).expect("aarch64 loader")
}

fn load(
    loader: &KexecLoader,
    map: &MemoryMap,
    kernel: &[u8],
    initramfs: Option<&[u8]>,
    cmdline: &str,
    options: &KexecOptions,
) -> Result<LoadResult, LoadError> {
    let mut kernel = kernel;
    let mut initramfs = initramfs;
    loader.load(
        map,
        &mut kernel,
        initramfs.as_mut().map(|r| r as &mut dyn Read),
        &stale_chosen(),
        &tree(),
        cmdline,
        options,
    )
}

fn decoded_chosen(result: &LoadResult) -> Node {
    let dtb = result.segments().get(0).expect("device tree segment");
    let fdt = Fdt::from_bytes(dtb.data()).expect("device tree decodes");
    fdt.root.child("chosen").expect("chosen node").clone()
}

/// arm64 `Image` header with the given size and flags.
fn image_with_header(len: usize, image_size: u64, flags: u64) -> Vec<u8> {
    let mut kernel = vec![0u8; len];
    kernel[16..24].copy_from_slice(&image_size.to_le_bytes());
    kernel[24..32].copy_from_slice(&flags.to_le_bytes());
    kernel[56..60].copy_from_slice(b"ARM\x64");
    kernel
}

#[test]
fn reference_layout() {
    let kernel = vec![0u8; KERNEL_SIZE];
    let result = load(&loader(), &ram_map(), &kernel, None, "", &KexecOptions::default())
        .expect("load");

    let ranges: Vec<PhysicalRange> = result.segments().ranges().collect();
    assert_eq!(
        ranges,
        [
            PhysicalRange::from_interval(0x0010_0000, 0x0010_1000),
            PhysicalRange::from_interval(0x0010_1000, 0x0010_2000),
            PhysicalRange::from_interval(0x0020_0000, 0x00C0_0000),
        ]
    );
    assert_eq!(result.entry(), PhysicalAddress::new(0x0010_1000));
    assert_eq!(result.entry(), result.segments().get(1).expect("stub").start());
}

#[test]
fn metadata_is_stripped_of_stale_initrd() {
    let kernel = vec![0u8; KERNEL_SIZE];
    let result = load(&loader(), &ram_map(), &kernel, None, "", &KexecOptions::default())
        .expect("load");

    let dtb = result.segments().get(0).expect("device tree segment");
    let expected = Fdt::new(Node::root().with_child(Node::new("chosen")));
    assert_eq!(Fdt::from_bytes(dtb.data()), Ok(expected));
}

#[test]
fn stub_points_at_kernel_and_metadata() {
    let kernel = vec![0u8; KERNEL_SIZE];
    let result = load(&loader(), &ram_map(), &kernel, None, "", &KexecOptions::default())
        .expect("load");

    let stub = result.segments().get(1).expect("stub").data();
    assert_eq!(
        stub[..24],
        [
            0xc4, 0x00, 0x00, 0x58, 0xe0, 0x00, 0x00, 0x58, 0xe1, 0x03, 0x1f, 0xaa, 0xe2, 0x03,
            0x1f, 0xaa, 0xe3, 0x03, 0x1f, 0xaa, 0x80, 0x00, 0x1f, 0xd6,
        ]
    );
    assert_eq!(stub[24..32], 0x0020_0000u64.to_le_bytes());
    assert_eq!(stub[32..40], 0x0010_0000u64.to_le_bytes());
    assert!(stub[40..].iter().all(|&b| b == 0));
}

#[test]
fn initramfs_follows_kernel_and_is_announced() {
    let kernel = vec![0u8; KERNEL_SIZE];
    let initramfs = vec![0x5Au8; 0x3000];
    let result = load(
        &loader(),
        &ram_map(),
        &kernel,
        Some(&initramfs[..]),
        "",
        &KexecOptions::default(),
    )
    .expect("load");

    assert_eq!(result.segments().len(), 4);
    let initrd = result.segments().get(3).expect("initramfs segment");
    assert_eq!(
        initrd.target(),
        PhysicalRange::from_interval(0x00C0_0000, 0x00C0_3000)
    );
    assert_eq!(initrd.data(), &initramfs[..]);

    let chosen = decoded_chosen(&result);
    assert_eq!(
        chosen.property(PROP_INITRD_START).and_then(Property::as_u64),
        Some(0x00C0_0000)
    );
    assert_eq!(
        chosen.property(PROP_INITRD_END).and_then(Property::as_u64),
        Some(0x00C0_3000)
    );
}

#[test]
fn empty_initramfs_is_ignored() {
    let kernel = vec![0u8; KERNEL_SIZE];
    let result = load(
        &loader(),
        &ram_map(),
        &kernel,
        Some(&[][..]),
        "",
        &KexecOptions::default(),
    )
    .expect("load");

    assert_eq!(result.segments().len(), 3);
    assert!(decoded_chosen(&result).property(PROP_INITRD_START).is_none());
}

#[test]
fn insufficient_memory() {
    let map: MemoryMap = [TypedRange::ram(0x0010_0000, 0x0020_0000)]
        .into_iter()
        .collect();
    let kernel = vec![0u8; KERNEL_SIZE];
    let err = load(&loader(), &map, &kernel, None, "", &KexecOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        LoadError::InsufficientMemory(InsufficientMemory {
            size: 0x00B0_0000,
            alignment: 0x1000
        })
    ));
}

#[test]
fn segments_stay_in_ram_and_apart() {
    let map: MemoryMap = [
        TypedRange::new(
            PhysicalRange::from_interval(0, 0x0010_0000),
            RangeType::Reserved,
        ),
        TypedRange::ram(0x0010_0000, 0x0080_0000),
        TypedRange::new(
            PhysicalRange::from_interval(0x0080_0000, 0x0090_0000),
            RangeType::Acpi,
        ),
        TypedRange::ram(0x4000_0800, 0x8000_0000),
    ]
    .into_iter()
    .collect();

    let kernel = vec![0u8; KERNEL_SIZE];
    let initramfs = vec![1u8; 0x0010_0001];
    let result = load(
        &loader(),
        &map,
        &kernel,
        Some(&initramfs[..]),
        "console=ttyAMA0",
        &KexecOptions::default(),
    )
    .expect("load");

    let segments = result.segments();
    assert_eq!(segments.validate(), Ok(()));
    assert_eq!(
        segments.get(0).expect("device tree").start(),
        PhysicalAddress::new(0x4000_1000)
    );
    for segment in segments {
        let ram = map
            .containing_ram(&segment.target())
            .expect("segment inside RAM");
        assert_eq!(ram.kind, RangeType::Ram);
        assert_eq!(segment.target().size(), segment.data().len() as u64);
    }

    let free = map.available_ram(segments);
    for range in free.iter() {
        assert!(segments.ranges().all(|s| !s.overlaps(&range.range)));
    }
}

#[test]
fn loading_is_deterministic() {
    let kernel: Vec<u8> = (0..KERNEL_SIZE).map(|i| u8::try_from(i % 251).unwrap()).collect();
    let initramfs = vec![7u8; 0x1234];
    let options = KexecOptions::default().with_extra_cmdline("quiet");

    let a = load(&loader(), &ram_map(), &kernel, Some(&initramfs[..]), "root=/dev/vda", &options)
        .expect("first load");
    let b = load(&loader(), &ram_map(), &kernel, Some(&initramfs[..]), "root=/dev/vda", &options)
        .expect("second load");
    assert_eq!(a, b);
}

#[test]
fn command_line_is_merged_into_bootargs() {
    let kernel = vec![0u8; 0x1000];
    let options = KexecOptions::default()
        .with_extra_cmdline("quiet")
        .with_extra_cmdline(" rdinit=/init ");
    let result = load(
        &loader(),
        &ram_map(),
        &kernel,
        None,
        " console=ttyAMA0 ",
        &options,
    )
    .expect("load");

    assert_eq!(
        decoded_chosen(&result)
            .property(PROP_BOOTARGS)
            .and_then(Property::as_str),
        Some("console=ttyAMA0 quiet rdinit=/init")
    );
}

#[test]
fn inputs_are_not_modified() {
    let tree = tree();
    let chosen = stale_chosen();
    let kernel = [0u8; 0x1000];
    let initramfs = [0u8; 0x1000];

    loader()
        .load(
            &ram_map(),
            &mut &kernel[..],
            Some(&mut &initramfs[..]),
            &chosen,
            &tree,
            "console=ttyAMA0",
            &KexecOptions::default(),
        )
        .expect("load");

    assert_eq!(tree, self::tree());
    assert_eq!(chosen, stale_chosen());
}

#[test]
fn image_header_footprint_pushes_initramfs() {
    let kernel = image_with_header(0x0001_0000, 0x0100_0000, 0b1010);
    let initramfs = vec![0u8; 0x1000];
    let options = KexecOptions::default().with_strict_image_header(true);
    let result = load(
        &loader(),
        &ram_map(),
        &kernel,
        Some(&initramfs[..]),
        "",
        &options,
    )
    .expect("load");

    let kernel_segment = result.segments().get(2).expect("kernel");
    assert_eq!(
        kernel_segment.target(),
        PhysicalRange::from_interval(0x0020_0000, 0x0021_0000)
    );
    let initrd = result.segments().get(3).expect("initramfs");
    assert_eq!(initrd.start(), PhysicalAddress::new(0x0120_0000));
}

#[test]
fn strict_header_rejects_raw_kernels() {
    let kernel = vec![0u8; 0x1000];
    let options = KexecOptions::default().with_strict_image_header(true);
    let err = load(&loader(), &ram_map(), &kernel, None, "", &options).unwrap_err();
    assert!(matches!(err, LoadError::InvalidKernelImage(_)));
}

#[test]
fn oversized_device_tree_is_rejected() {
    let huge = Fdt::new(
        Node::root().with_child(Node::new("blob").with_property(Property::new(
            "data",
            vec![0u8; 0x0010_0000],
        ))),
    );
    let kernel = [0u8; 0x1000];
    let err = loader()
        .load(
            &ram_map(),
            &mut &kernel[..],
            None,
            &Node::new("chosen"),
            &huge,
            "",
            &KexecOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::MetadataTooLarge {
            capacity: 0x000F_F000,
            ..
        }
    ));
}

#[test]
fn large_device_tree_grows_metadata_slot() {
    let big = Fdt::new(
        Node::root().with_child(
            Node::new("blob").with_property(Property::new("data", vec![0u8; 0x1800])),
        ),
    );
    let kernel = [0u8; 0x1000];
    let result = loader()
        .load(
            &ram_map(),
            &mut &kernel[..],
            None,
            &Node::new("chosen"),
            &big,
            "",
            &KexecOptions::default(),
        )
        .expect("load");

    let dtb = result.segments().get(0).expect("device tree");
    assert_eq!(dtb.target().size(), 0x2000);
    assert_eq!(result.entry(), PhysicalAddress::new(0x0010_2000));
    let stub = result.segments().get(1).expect("stub").data();
    assert_eq!(stub[32..40], 0x0010_0000u64.to_le_bytes());
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::other("disk on fire"))
    }
}

#[test]
fn read_failures_name_the_stream() {
    let loader = loader();
    let err = loader
        .load(
            &ram_map(),
            &mut FailingReader,
            None,
            &stale_chosen(),
            &tree(),
            "",
            &KexecOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        LoadError::ImageReadFailure {
            image: ImageKind::Kernel,
            ..
        }
    ));

    let kernel = [0u8; 0x1000];
    let err = loader
        .load(
            &ram_map(),
            &mut &kernel[..],
            Some(&mut FailingReader),
            &stale_chosen(),
            &tree(),
            "",
            &KexecOptions::default(),
        )
        .unwrap_err();
    match err {
        LoadError::ImageReadFailure { image, source } => {
            assert_eq!(image, ImageKind::Secondary);
            assert_eq!(source.to_string(), "disk on fire");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn custom_layout_is_validated() {
    let err = KexecLoader::builder()
        .layout(BootLayout {
            kernel_offset: 0x0010_0800,
            ..BootLayout::default()
        })
        .build()
        .unwrap_err();
    assert!(matches!(err, LoadError::InvalidLayout(_)));
    assert!(matches!(
        KexecLoader::new(Arch::X86_64),
        Err(LoadError::UnsupportedArchitecture(Arch::X86_64))
    ));
}

struct CaptureLogger {
    records: Mutex<Vec<(Level, String)>>,
}

impl CaptureLogger {
    const fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    fn messages(&self, level: Level) -> Vec<String> {
        self.records
            .lock()
            .expect("lock")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        self.records
            .lock()
            .expect("lock")
            .push((record.level(), record.args().to_string()));
    }

    fn flush(&self) {}
}

#[test]
fn diagnostics_go_to_the_injected_logger() {
    static LOGGER: CaptureLogger = CaptureLogger::new();

    let loader = KexecLoader::builder()
        .logger(&LOGGER)
        .build()
        .expect("loader");
    // kernel lands at 0x4010_0000, which is not 2 MiB aligned
    let map: MemoryMap = [TypedRange::ram(0x4000_0000, 0x5000_0000)]
        .into_iter()
        .collect();
    let kernel = image_with_header(0x1000, 0, 0b0010);
    let mut empty: &[u8] = &[];
    loader
        .load(
            &map,
            &mut &kernel[..],
            Some(&mut empty),
            &stale_chosen(),
            &tree(),
            "",
            &KexecOptions::default(),
        )
        .expect("load");

    let warnings = LOGGER.messages(Level::Warn);
    assert!(warnings.iter().any(|m| m.contains("initramfs is empty")));
    assert!(warnings.iter().any(|m| m.contains("not 2 MiB aligned")));
    assert!(
        LOGGER
            .messages(Level::Info)
            .iter()
            .any(|m| m.starts_with("loaded 3 segments"))
    );
}
