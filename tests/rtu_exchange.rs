//! End-to-end exchanges over the simulated USART

use avr_modbus_rtu::sim::{self, SimGpio, SimPin, SimUsart};
use avr_modbus_rtu::{
    AsyncExchange, AsyncState, IoFlags, MemChunk, ModbusError, ModbusRequest, ModbusResponse,
    ModbusRtu, Uart, UartUnit, RESP_DATA_SIZE,
};

const PARAMS: &str = "uart=UART1:9600@8N1,de_port=PORTL:0";

/// Read Holding Registers reply from slave 0x11 carrying three registers
const RESPONSE: [u8; 11] = [
    0x11, 0x03, 0x06, 0xAE, 0x41, 0x56, 0x52, 0x43, 0x40, 0x49, 0xAD,
];

fn units() -> [UartUnit<SimUsart>; 2] {
    [UartUnit::new(SimUsart::new()), UartUnit::new(SimUsart::new())]
}

fn engine<'a>(units: &'a [UartUnit<SimUsart>]) -> ModbusRtu<'a, SimUsart, SimPin> {
    ModbusRtu::setup(units, &mut SimGpio::new(), PARAMS).unwrap()
}

/// Drive the exchange to completion, delivering one byte before each poll
fn poll_byte_by_byte(
    rtu: &mut ModbusRtu<'_, SimUsart, SimPin>,
    unit: &UartUnit<SimUsart>,
    exchange: &mut AsyncExchange,
    frame: &[u8],
) -> (Vec<AsyncState>, nb::Result<(), ModbusError>) {
    let mut states = Vec::new();
    let mut outcome = Err(nb::Error::WouldBlock);

    for (i, &byte) in frame.iter().enumerate() {
        unit.regs().inject(&[byte]);
        sim::service_until_idle(unit);

        outcome = rtu.recv_async(exchange);
        states.push(exchange.state());

        if i + 1 < frame.len() {
            assert_eq!(outcome, Err(nb::Error::WouldBlock), "poll {i} finished early");
        }
    }

    (states, outcome)
}

#[test]
fn request_bytes_are_deterministic() {
    let units = units();
    let mut rtu = engine(&units);

    let mut request = ModbusRequest::new(0x11, 0x03, 0x000A);
    rtu.send_sync(&mut request);
    rtu.send_sync(&mut request);

    let frame = [0x11, 0x03, 0x00, 0x0A, 0x75, 0x1F];
    let wire = units[1].regs().take_transmitted();
    assert_eq!(&wire[..6], &frame);
    assert_eq!(&wire[6..], &frame);
    assert!(units[0].regs().transmitted().is_empty());
}

#[test]
fn sync_and_async_receive_agree() {
    let units = units();
    let mut rtu = engine(&units);

    let mut sync_response = ModbusResponse::new();
    units[1].regs().inject(&RESPONSE);
    let sync_result = sim::with_interrupts(&units[1], || rtu.recv_sync(&mut sync_response));
    assert_eq!(sync_result, Ok(()));

    let mut exchange = AsyncExchange::new();
    let (states, outcome) = poll_byte_by_byte(&mut rtu, &units[1], &mut exchange, &RESPONSE);

    assert_eq!(outcome, Ok(()));
    assert_eq!(exchange.response(), &sync_response);
    assert_eq!(sync_response.payload(), &RESPONSE[3..9]);
    assert_eq!(sync_response.crc, 0xAD49);

    // Header -> Data -> Crc -> Completed, one byte at a time
    let mut expected = vec![AsyncState::Header; 2];
    expected.extend([AsyncState::Data; 6]);
    expected.extend([AsyncState::Crc; 2]);
    expected.push(AsyncState::Completed);
    assert_eq!(states, expected);
}

#[test]
fn corrupted_byte_fails_both_paths() {
    for index in 0..RESPONSE.len() {
        let units = units();
        let mut rtu = engine(&units);

        let mut frame = RESPONSE;
        frame[index] ^= 0x10;
        // A corrupted byte count changes the frame layout; skip it here
        if index == 2 {
            continue;
        }

        let mut response = ModbusResponse::new();
        units[1].regs().inject(&frame);
        let sync_result = sim::with_interrupts(&units[1], || rtu.recv_sync(&mut response));
        assert!(matches!(sync_result, Err(ModbusError::Crc { .. })), "byte {index}");

        let mut exchange = AsyncExchange::new();
        let (_, outcome) = poll_byte_by_byte(&mut rtu, &units[1], &mut exchange, &frame);
        assert!(
            matches!(outcome, Err(nb::Error::Other(ModbusError::Crc { .. }))),
            "byte {index}"
        );
        assert_eq!(exchange.result(), Some(sync_result));
    }
}

#[test]
fn oversized_length_completes_without_consuming_more() {
    let units = units();
    let mut rtu = engine(&units);
    let mut exchange = AsyncExchange::new();

    let declared = RESP_DATA_SIZE as u8 + 1;
    units[1].regs().inject(&[0x11, 0x03, declared, 0xAA, 0xBB, 0xCC]);
    sim::service_until_idle(&units[1]);

    let expected = ModbusError::Capacity {
        declared: RESP_DATA_SIZE + 1,
        capacity: RESP_DATA_SIZE,
    };
    assert_eq!(rtu.recv_async(&mut exchange), Err(nb::Error::Other(expected)));
    assert!(exchange.is_completed());
    assert_eq!(units[1].rx_pending(), 3);

    // Terminal: polling again neither reads nor changes the outcome
    assert_eq!(rtu.recv_async(&mut exchange), Err(nb::Error::Other(expected)));
    assert_eq!(units[1].rx_pending(), 3);
    assert!(!expected.is_corruption());
}

#[test]
fn full_capacity_payload_is_accepted() {
    let units = units();
    let mut rtu = engine(&units);

    let mut frame = vec![0x11, 0x04, RESP_DATA_SIZE as u8];
    frame.extend((0..RESP_DATA_SIZE as u8).map(|b| b.wrapping_mul(7)));
    let crc = avr_modbus_rtu::crc16(&frame);
    frame.extend(crc.to_le_bytes());

    let mut exchange = AsyncExchange::new();
    let (_, outcome) = poll_byte_by_byte(&mut rtu, &units[1], &mut exchange, &frame);
    assert_eq!(outcome, Ok(()));
    assert_eq!(exchange.response().payload().len(), RESP_DATA_SIZE);
}

#[test]
fn loopback_chunks_preserve_order_and_progress() {
    let units = [UartUnit::new(SimUsart::loopback())];
    let mut uart = Uart::setup(&units, "UART0:115200@8N1").unwrap();

    let outbound: Vec<u8> = (0..=255u8).rev().collect();
    let mut inbound = vec![0u8; outbound.len()];

    let mut tx = MemChunk::new(&outbound[..]);
    let mut rx = MemChunk::new(&mut inbound[..]);
    let mut polls = 0;

    while !(tx.is_complete() && rx.is_complete()) {
        let sent_before = tx.progress();
        let received_before = rx.progress();

        let _ = uart.write_chunk(&mut tx, IoFlags::NONBLOCK);
        sim::service_until_idle(&units[0]);
        let _ = uart.read_chunk(&mut rx, IoFlags::NONBLOCK);

        assert!(tx.progress() >= sent_before);
        assert!(rx.progress() >= received_before);
        assert!(rx.progress() <= tx.progress());
        polls += 1;
    }

    // Ring buffers are far smaller than the payload
    assert!(polls > 1);
    assert_eq!(inbound, outbound);
    assert_eq!(units[0].regs().take_transmitted(), outbound);
}
