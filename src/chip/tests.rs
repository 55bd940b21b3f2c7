use super::*;
use crate::memory::{ConfigurationData, MemoryCell, SSRAM_BANK_SIZE, SSRAM_N_BANKS};
use crate::router::Side;

const NULL: ClockId = ClockId::NULL;

fn byte(ssram: &ShadowSram, bank: usize, byte: usize) -> u8 {
    ssram.get(bank, byte).unwrap().value()
}

fn bytes(ssram: &ShadowSram, bank: usize, byte: usize, n: usize) -> Vec<u8> {
    (byte .. byte + n).map(|b| ssram.get(bank, b).unwrap().value()).collect()
}

fn route_of(chip: &Chip, link: LinkId) -> Vec<(ChannelKind, Side)> {
    chip.links()[link.0].channels.iter()
        .map(|id| (chip.channels()[*id].kind(), chip.channels()[*id].side()))
        .collect()
}

/* IO1 -> GainInv(0.5) on CAB1 -> IO3 */
fn gain_chip() -> (Chip, ModuleId, LinkId, LinkId) {
    let mut chip = Chip::new();
    chip.set_io_mode(IoCellId(1), IoMode::InputBypass).unwrap();
    chip.set_io_mode(IoCellId(3), IoMode::OutputBypass).unwrap();
    chip.set_clock(ClockId(1), 250, 0).unwrap();
    chip.setup_block(BlockId(1), ClockId(1), NULL).unwrap();

    let gain = chip.add_module(BlockId(1), "gain", ModuleKind::GainInv { gain: 0.5 }).unwrap();
    let input = chip.module(gain).unwrap().input(0).unwrap();
    let output = chip.module(gain).unwrap().output().unwrap();

    let l_in = chip.connect(OutPortId::IoCell(IoCellId(1)), input).unwrap();
    let l_out = chip.connect(output, InPortId::IoCell(IoCellId(3))).unwrap();

    (chip, gain, l_in, l_out)
}

#[test]
fn test_claim_exclusivity() {
    let mut block = Block::new(BlockId(2));

    block.claim_cap_at(3, ModuleId(0)).unwrap();
    assert!(matches!(
        block.claim_cap_at(3, ModuleId(1)),
        Err(DesignError::AlreadyClaimed(_))
    ));
    block.claim_opamp_at(1, ModuleId(0)).unwrap();
    assert!(matches!(
        block.claim_opamp_at(1, ModuleId(0)),
        Err(DesignError::AlreadyClaimed(_))
    ));

    /* First free slots, in order, skipping the one taken above */
    let caps: Vec<_> = (0 .. 7).map(|_| block.claim_cap(ModuleId(1)).unwrap()).collect();
    assert_eq!(caps, vec![0, 1, 2, 4, 5, 6, 7]);
    assert!(matches!(block.claim_cap(ModuleId(1)), Err(DesignError::ResourceExhausted(_))));

    assert_eq!(block.claim_opamp(ModuleId(1)).unwrap(), 0);
    assert!(matches!(block.claim_opamp(ModuleId(1)), Err(DesignError::ResourceExhausted(_))));

    block.claim_comp(ModuleId(1)).unwrap();
    assert!(matches!(block.claim_comp(ModuleId(2)), Err(DesignError::ResourceExhausted(_))));
    assert!(matches!(
        block.claim_comp_at(0, ModuleId(1)),
        Err(DesignError::AlreadyClaimed(_))
    ));
    assert!(matches!(
        block.claim_comp_at(1, ModuleId(1)),
        Err(DesignError::ResourceExhausted(_))
    ));

    for slot in 0 .. N_LOCAL_INPUTS_PER_BLOCK {
        assert_eq!(block.claim_local_input(ModuleId(1)).unwrap(), slot);
    }
    assert!(matches!(
        block.claim_local_input(ModuleId(1)),
        Err(DesignError::ResourceExhausted(_))
    ));
}

#[test]
fn test_module_claims() {
    let mut chip = Chip::new();
    let sum = chip.add_module(BlockId(2), "sum", ModuleKind::SumInv { lgain: 0.5, ugain: 0.25 })
        .unwrap();
    let module = chip.module(sum).unwrap();
    assert_eq!(module.claimed_caps(), &[0, 1, 2, 3, 4, 5]);
    assert_eq!(module.claimed_opamps(), &[0]);
    assert_eq!(module.n_inputs(), 2);
    assert!(matches!(module.cap(6), Err(DesignError::ResourceExhausted(_))));
    assert!(matches!(module.comparator_input(), Err(DesignError::InvalidPort(_))));

    /* 6 + 4 > 8 */
    assert!(matches!(
        chip.add_module(BlockId(2), "gain", ModuleKind::GainInv { gain: 1.0 }),
        Err(DesignError::ResourceExhausted(_))
    ));

    let integ = chip.add_module(
        BlockId(4),
        "integ",
        ModuleKind::Integrator { integ_const: 0.42, reset: true }
    ).unwrap();
    assert!(chip.module(integ).unwrap().comparator_input().is_ok());
    assert!(matches!(
        chip.add_module(BlockId(4), "switch", ModuleKind::GainSwitch { ugain: 1.0, lgain: 1.0 }),
        Err(DesignError::ResourceExhausted(_))
    ));

    assert!(matches!(
        chip.add_module(BlockId(1), "bad", ModuleKind::GainInv { gain: -1.0 }),
        Err(DesignError::InvalidParameter(_))
    ));
    assert!(chip.add_module(BlockId::NULL, "nowhere", ModuleKind::SampleAndHold).is_err());
}

#[test]
fn test_gain_inv_scenario() {
    let (mut chip, gain, l_in, l_out) = gain_chip();
    let ssram = chip.compile().unwrap();

    let module = chip.module(gain).unwrap();
    assert_eq!(module.claimed_caps().len(), 4);
    assert_eq!(module.claimed_opamps().len(), 1);

    assert_eq!(route_of(&chip, l_in), vec![(
        ChannelKind::GlobalInputDirect { group: IoGroup(0), block: BlockId(1) },
        Side::Primary
    )]);
    assert_eq!(route_of(&chip, l_out), vec![
        (ChannelKind::LocalOutput(BlockId(1)), Side::Primary),
        (ChannelKind::GlobalBiIndirect(ColumnGroup::Odd), Side::Primary),
    ]);

    /* Capacitor values: caps 1 and 2 sample the input, 3 and 4 are the reference */
    assert_eq!(bytes(&ssram, 3, 0x00, 8), vec![0, 0, 0, 0, 254, 254, 127, 127]);
    /* Cap 1: from direct input (0x5) in phase 1, cap 2 in phase 2 */
    assert_eq!(bytes(&ssram, 4, 0x1C, 4), vec![0x01, 0x15, 0x01, 0x81]);
    assert_eq!(bytes(&ssram, 3, 0x1C, 4), vec![0x01, 0x51, 0x01, 0x18]);
    /* Cap 3 and 4 sample op-amp 1 */
    assert_eq!(bytes(&ssram, 4, 0x16, 4), vec![0x01, 0x13, 0x01, 0x81]);
    assert_eq!(bytes(&ssram, 3, 0x18, 4), vec![0x01, 0x31, 0x01, 0x18]);
    /* Unused capacitors get cleared */
    assert_eq!(bytes(&ssram, 4, 0x10, 4), vec![0, 0, 0, 0]);

    assert_eq!(bytes(&ssram, 4, 0x1A, 2), vec![0x00, 0x05]);
    assert_eq!(bytes(&ssram, 4, 0x14, 2), vec![0x00, 0x00]);
    assert_eq!(byte(&ssram, 3, 0x0C), 0xC0);

    /* Clock 1 divided down to 250 kHz */
    assert_eq!(byte(&ssram, 0, 0x07), 32);
    assert_eq!(ssram.get(0, 0x06).unwrap(), MemoryCell::Unset);

    assert_eq!(bytes(&ssram, 0, 0x08, 4), vec![0x40, 0x00, 0x10, 0x00]);
    /* Odd bus driven by op-amp 1 of CAB1, feeding IO3 through the local output */
    assert_eq!(byte(&ssram, 1, 0x00), 0x11);
    assert_eq!(byte(&ssram, 1, 0x06), 0x81);
    assert_eq!(byte(&ssram, 3, 0x0A), 0x81);
    assert_eq!(byte(&ssram, 3, 0x08), 0x00);
}

#[test]
fn test_determinism() {
    let (mut first, ..) = gain_chip();
    let (mut second, ..) = gain_chip();
    let stream = first.to_bytestream().unwrap();
    assert_eq!(stream, second.to_bytestream().unwrap());
    /* Compiling again does not route again */
    assert_eq!(stream, first.to_bytestream().unwrap());
}

#[test]
fn test_bytestream_round_trip() {
    let (mut chip, ..) = gain_chip();
    let ssram = chip.compile().unwrap();
    let stream = chip.to_bytestream().unwrap();

    assert_eq!(&stream[.. DeviceHeader::SIZE], &[0xD5, 0x00, 0x01, 0x20, 0x01, 0x01, 0x05]);

    let decoded = ConfigurationData::parse(&stream, SSRAM_BANK_SIZE, SSRAM_N_BANKS, 0).unwrap();
    assert_eq!(decoded.header, chip.header());
    assert_eq!(decoded.memory.values(), ssram.values());
}

#[test]
fn test_finalized_design_is_frozen() {
    let (mut chip, ..) = gain_chip();
    chip.compile().unwrap();
    assert!(chip.add_module(BlockId(2), "late", ModuleKind::SampleAndHold).is_err());
    assert!(chip.set_io_mode(IoCellId(2), IoMode::InputBypass).is_err());
}

#[test]
fn test_fan_out() {
    let mut chip = Chip::new();
    chip.set_io_mode(IoCellId(1), IoMode::InputBypass).unwrap();
    chip.setup_block(BlockId(3), ClockId(1), NULL).unwrap();
    let sum = chip.add_module(BlockId(3), "sum", ModuleKind::SumInv { lgain: 0.32, ugain: 0.58 })
        .unwrap();

    let from = OutPortId::IoCell(IoCellId(1));
    let module = chip.module(sum).unwrap().clone();
    let l1 = chip.connect(from, module.input(0).unwrap()).unwrap();
    let l2 = chip.connect(from, module.input(1).unwrap()).unwrap();
    chip.compile().unwrap();

    /* Both inputs share one wire */
    assert_eq!(chip.links()[l1.0].channels, chip.links()[l2.0].channels);
    assert_eq!(route_of(&chip, l1), vec![(
        ChannelKind::GlobalInputDirect { group: IoGroup(0), block: BlockId(3) },
        Side::Primary
    )]);
}

#[test]
fn test_connect_errors() {
    let mut chip = Chip::new();
    chip.set_io_mode(IoCellId(1), IoMode::InputBypass).unwrap();
    chip.set_io_mode(IoCellId(2), IoMode::InputBypass).unwrap();
    assert!(matches!(
        chip.set_io_mode(IoCellId(2), IoMode::OutputBypass),
        Err(DesignError::AlreadyClaimed(_))
    ));

    let gain = chip.add_module(BlockId(1), "gain", ModuleKind::GainInv { gain: 0.5 }).unwrap();
    let input = chip.module(gain).unwrap().input(0).unwrap();

    chip.connect(OutPortId::IoCell(IoCellId(1)), input).unwrap();
    assert!(matches!(
        chip.connect(OutPortId::IoCell(IoCellId(2)), input),
        Err(DesignError::AlreadyConnected(_))
    ));

    /* IO cell in input mode has no input, disabled one has nothing */
    assert!(matches!(
        chip.connect(OutPortId::OpAmp(BlockId(1), 0), InPortId::IoCell(IoCellId(1))),
        Err(DesignError::InvalidPort(_))
    ));
    assert!(matches!(
        chip.connect(OutPortId::IoCell(IoCellId(4)), input),
        Err(DesignError::InvalidPort(_))
    ));
    /* Nobody claimed these */
    assert!(matches!(
        chip.connect(OutPortId::IoCell(IoCellId(1)), InPortId::Local(BlockId(1), 5)),
        Err(DesignError::InvalidPort(_))
    ));
    assert!(matches!(
        chip.connect(OutPortId::OpAmp(BlockId(1), 1), input),
        Err(DesignError::InvalidPort(_))
    ));
}

#[test]
fn test_unconnected_input() {
    let mut chip = Chip::new();
    chip.add_module(BlockId(1), "gain", ModuleKind::GainInv { gain: 0.5 }).unwrap();
    assert!(matches!(chip.compile(), Err(DesignError::InvalidPort(_))));
}

#[test]
fn test_unrealizable_clock() {
    let (mut chip, ..) = gain_chip();
    chip.set_clock(ClockId(2), 3000, 0).unwrap();
    assert!(matches!(chip.compile(), Err(DesignError::UnrealizableValue(_))));

    let mut chip = Chip::new();
    assert!(chip.set_clock(ClockId(7), 1000, 0).is_err());
    assert!(chip.setup_block(BlockId(1), ClockId(9), NULL).is_err());

    let (mut chip, ..) = gain_chip();
    chip.set_clock(ClockId(2), 3_000_000_000, 0).unwrap();
    assert!(matches!(chip.compile(), Err(DesignError::UnrealizableValue(_))));
}

#[test]
fn test_unconfigured_clock_follows_system_clock() {
    let mut chip = Chip::with_system_clock(24_000);
    chip.setup_block(BlockId(1), ClockId(1), NULL).unwrap();
    assert_eq!(chip.clock(ClockId(1)).unwrap().freq_khz(), 24_000);

    let ssram = chip.compile().unwrap();
    assert_eq!(ssram.get(0x00, 0x07).unwrap(), MemoryCell::Set(0));
}

#[test]
fn test_comparator_selectors() {
    /* Comparator fed from far away IO3, through the odd bus */
    let mut chip = Chip::new();
    for cell in 1 ..= 3 {
        chip.set_io_mode(IoCellId(cell), IoMode::InputBypass).unwrap();
    }
    chip.set_io_mode(IoCellId(4), IoMode::OutputBypass).unwrap();
    chip.setup_block(BlockId(1), ClockId(1), ClockId(2)).unwrap();
    let switch = chip.add_module(
        BlockId(1),
        "switch",
        ModuleKind::GainSwitch { ugain: 1.0, lgain: 0.5 }
    ).unwrap();
    let module = chip.module(switch).unwrap().clone();
    chip.connect(OutPortId::IoCell(IoCellId(1)), module.input(0).unwrap()).unwrap();
    chip.connect(OutPortId::IoCell(IoCellId(2)), module.input(1).unwrap()).unwrap();
    chip.connect(OutPortId::IoCell(IoCellId(3)), module.comparator_input().unwrap()).unwrap();
    chip.connect(module.output().unwrap(), InPortId::IoCell(IoCellId(4))).unwrap();

    let ssram = chip.compile().unwrap();
    assert_eq!(byte(&ssram, 4, 0x0B), 0x07);
    assert_eq!(bytes(&ssram, 4, 0x09, 2), vec![0x07, 0xC9]);
    assert_eq!(byte(&ssram, 4, 0x06), 0x80);
    assert_eq!(byte(&ssram, 3, 0x0E), 0x08);
    assert_eq!(byte(&ssram, 3, 0x0C), 0xCD);

    /* Comparator fed straight from IO2, whose direct wire Primary side is taken */
    let mut chip = Chip::new();
    chip.set_io_mode(IoCellId(1), IoMode::InputBypass).unwrap();
    chip.set_io_mode(IoCellId(2), IoMode::InputBypass).unwrap();
    chip.set_io_mode(IoCellId(3), IoMode::OutputBypass).unwrap();
    chip.setup_block(BlockId(1), ClockId(1), ClockId(3)).unwrap();
    let integ = chip.add_module(
        BlockId(1),
        "integ",
        ModuleKind::Integrator { integ_const: 1.0, reset: true }
    ).unwrap();
    let module = chip.module(integ).unwrap().clone();
    chip.connect(OutPortId::IoCell(IoCellId(1)), module.input(0).unwrap()).unwrap();
    chip.connect(OutPortId::IoCell(IoCellId(2)), module.comparator_input().unwrap()).unwrap();
    chip.connect(module.output().unwrap(), InPortId::IoCell(IoCellId(3))).unwrap();

    let ssram = chip.compile().unwrap();
    assert_eq!(byte(&ssram, 4, 0x0B), 0x14);
}

#[test]
fn test_global_bus_exhaustion() {
    fn chip_with_two_outputs() -> (Chip, ModuleId) {
        let mut chip = Chip::new();
        for cell in 1 ..= 2 {
            chip.set_io_mode(IoCellId(cell), IoMode::InputBypass).unwrap();
        }
        for cell in 3 ..= 4 {
            chip.set_io_mode(IoCellId(cell), IoMode::OutputBypass).unwrap();
        }

        let first = chip.add_module(BlockId(1), "first", ModuleKind::GainInv { gain: 0.5 })
            .unwrap();
        let second = chip.add_module(BlockId(3), "second", ModuleKind::GainInv { gain: 0.5 })
            .unwrap();
        let first = chip.module(first).unwrap().clone();
        let second_m = chip.module(second).unwrap().clone();

        chip.connect(OutPortId::IoCell(IoCellId(2)), first.input(0).unwrap()).unwrap();
        chip.connect(first.output().unwrap(), InPortId::IoCell(IoCellId(3))).unwrap();
        chip.connect(second_m.output().unwrap(), InPortId::IoCell(IoCellId(4))).unwrap();

        (chip, second)
    }

    /* Both sides of the odd bus in use, one per driver */
    let (mut chip, second) = chip_with_two_outputs();
    let second = chip.module(second).unwrap().clone();
    chip.connect(OutPortId::IoCell(IoCellId(1)), second.input(0).unwrap()).unwrap();
    chip.compile().unwrap();

    /* A third driver for the same bus has nowhere to go: CAB3 can only loop
     * its op-amp back to its own inputs through the odd bus */
    let (mut chip, second) = chip_with_two_outputs();
    let second = chip.module(second).unwrap().clone();
    let third = chip.add_module(BlockId(3), "third", ModuleKind::GainInv { gain: 0.5 })
        .unwrap();
    let third = chip.module(third).unwrap().clone();
    chip.connect(third.output().unwrap(), second.input(0).unwrap()).unwrap();
    chip.connect(OutPortId::IoCell(IoCellId(1)), third.input(0).unwrap()).unwrap();

    assert!(matches!(chip.compile(), Err(DesignError::RoutingConflict(_))));
}
