use device_tree::{Fdt, FdtError, Node, Property, ReserveEntry};

fn qemu_virt_like() -> Fdt {
    let root = Node::root()
        .with_property(Property::u32("#address-cells", 2))
        .with_property(Property::u32("#size-cells", 2))
        .with_property(Property::string("compatible", "linux,dummy-virt"))
        .with_child(
            Node::new("memory@40000000")
                .with_property(Property::string("device_type", "memory"))
                .with_property(Property::cells("reg", &[0, 0x4000_0000, 0, 0x1000_0000])),
        )
        .with_child(
            Node::new("cpus")
                .with_property(Property::u32("#address-cells", 1))
                .with_property(Property::u32("#size-cells", 0))
                .with_child(
                    Node::new("cpu@0")
                        .with_property(Property::string("compatible", "arm,cortex-a57"))
                        .with_property(Property::u32("reg", 0))
                        .with_property(Property::empty("dma-coherent")),
                ),
        )
        .with_child(
            Node::new("chosen")
                .with_property(Property::string("bootargs", "console=ttyAMA0 root=/dev/vda"))
                .with_property(Property::u64("linux,initrd-start", 0x4800_0000))
                .with_property(Property::u64("linux,initrd-end", 0x4880_0000)),
        );

    let mut fdt = Fdt::new(root);
    fdt.boot_cpuid_phys = 0;
    fdt.reserved.push(ReserveEntry {
        address: 0x4000_0000,
        size: 0x0001_0000,
    });
    fdt
}

#[test]
fn encode_then_decode_preserves_tree() {
    let fdt = qemu_virt_like();
    let bytes = fdt.to_bytes().expect("encode");
    let decoded = Fdt::from_bytes(&bytes).expect("decode");
    assert_eq!(decoded, fdt);

    // re-encoding the decoded tree is byte-identical
    assert_eq!(decoded.to_bytes().expect("re-encode"), bytes);
}

#[test]
fn equal_trees_encode_identically() {
    assert_eq!(qemu_virt_like().to_bytes(), qemu_virt_like().to_bytes());

    let mut other = qemu_virt_like();
    other.boot_cpuid_phys = 1;
    assert_ne!(other.to_bytes(), qemu_virt_like().to_bytes());
}

#[test]
fn chosen_properties_survive_round_trip() {
    let bytes = qemu_virt_like().to_bytes().expect("encode");
    let decoded = Fdt::from_bytes(&bytes).expect("decode");
    let chosen = decoded.root.child("chosen").expect("chosen node");

    assert_eq!(
        chosen.property("bootargs").and_then(Property::as_str),
        Some("console=ttyAMA0 root=/dev/vda")
    );
    assert_eq!(
        chosen.property("linux,initrd-start").and_then(Property::as_u64),
        Some(0x4800_0000)
    );
    assert_eq!(
        chosen.property("linux,initrd-end").and_then(Property::as_u64),
        Some(0x4880_0000)
    );
}

#[test]
fn corrupted_blobs_are_reported() {
    let bytes = qemu_virt_like().to_bytes().expect("encode");

    let mut bad_magic = bytes.clone();
    bad_magic[0] ^= 0xff;
    assert_eq!(Fdt::from_bytes(&bad_magic), Err(FdtError::BadMagic));

    assert_eq!(Fdt::from_bytes(&bytes[..bytes.len() / 2]), Err(FdtError::Truncated));
}
