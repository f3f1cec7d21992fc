#![no_main]

//! Arbitrary bytes through both receive paths: they must agree and never
//! read past the end of the frame they decoded.

use libfuzzer_sys::fuzz_target;

use avr_modbus_rtu::sim::{self, SimGpio, SimUsart};
use avr_modbus_rtu::{AsyncExchange, ModbusResponse, ModbusRtu, UartUnit};

const PARAMS: &str = "uart=UART0:9600@8N1,de_port=PORTL:0";

fuzz_target!(|data: &[u8]| {
    let units = [UartUnit::new(SimUsart::new())];
    let Ok(mut rtu) = ModbusRtu::setup(&units, &mut SimGpio::new(), PARAMS) else {
        return;
    };

    // Async first: it stops by itself when the input runs out
    let mut exchange = AsyncExchange::new();
    let mut consumed = 0;
    let mut outcome = Err(nb::Error::WouldBlock);
    for &byte in data {
        units[0].regs().inject(&[byte]);
        sim::service_until_idle(&units[0]);
        consumed += 1;

        outcome = rtu.recv_async(&mut exchange);
        if !matches!(outcome, Err(nb::Error::WouldBlock)) {
            break;
        }
    }

    let async_result = match outcome {
        Ok(()) => Ok(()),
        Err(nb::Error::Other(e)) => Err(e),
        Err(nb::Error::WouldBlock) => return,
    };
    assert_eq!(units[0].rx_pending(), 0);

    // Replay exactly the consumed prefix through the blocking path
    let mut response = ModbusResponse::new();
    units[0].regs().inject(&data[..consumed]);
    let sync_result = sim::with_interrupts(&units[0], || rtu.recv_sync(&mut response));

    assert_eq!(sync_result, async_result);
    if sync_result.is_ok() {
        assert_eq!(&response, exchange.response());
    }
});
