use embassy_futures::select::{Either, select};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Instant, Timer};
use embedded_io_async::{Read, Write};
use static_cell::StaticCell;

use super::SharedController;
use crate::console::{ConsoleResponse, LineAssembler, LineEvent, respond};
use crate::status;

const CONSOLE_BAUD: u32 = 115_200;
const CONSOLE_BUFFER_SIZE: usize = 256;
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);

static UART_TX_BUFFER: StaticCell<[u8; CONSOLE_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; CONSOLE_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    controller: &'static SharedController,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = CONSOLE_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = BufferedUart::new(
        usart,
        rx_pin,
        tx_pin,
        UART_TX_BUFFER.init([0; CONSOLE_BUFFER_SIZE]),
        UART_RX_BUFFER.init([0; CONSOLE_BUFFER_SIZE]),
        UartIrqs,
        config,
    )
    .expect("failed to initialize console UART");
    let (mut uart_tx, mut uart_rx) = uart.split();

    let mut assembler = LineAssembler::new();
    let mut response = ConsoleResponse::new();
    let mut ingress = [0u8; 32];
    let mut next_heartbeat = Instant::now() + HEARTBEAT_PERIOD;

    write_all(&mut uart_tx, b"watering controller ready; type `help`\r\n> ").await;

    loop {
        match select(uart_rx.read(&mut ingress), Timer::at(next_heartbeat)).await {
            Either::First(Ok(count)) => {
                for &byte in &ingress[..count] {
                    match assembler.push(byte) {
                        LineEvent::Pending => {}
                        LineEvent::Overflow => {
                            write_all(&mut uart_tx, b"\r\nERR line too long\r\n> ").await;
                        }
                        LineEvent::Line(line) => {
                            response.clear();
                            {
                                let mut controller = controller.lock().await;
                                respond(&line, &mut controller, Instant::now().as_secs(), &mut response);
                            }
                            write_all(&mut uart_tx, b"\r\n").await;
                            write_all(&mut uart_tx, response.as_bytes()).await;
                            write_all(&mut uart_tx, b"> ").await;
                        }
                    }
                }
            }
            Either::First(Err(_)) => {
                defmt::warn!("console: UART read error");
                Timer::after(Duration::from_millis(5)).await;
            }
            Either::Second(()) => {
                next_heartbeat += HEARTBEAT_PERIOD;
                response.clear();
                if status::render_heartbeat(Instant::now().as_secs(), &mut response).is_ok()
                    && response.push_str("\r\n").is_ok()
                {
                    write_all(&mut uart_tx, response.as_bytes()).await;
                }
            }
        }
    }
}

async fn write_all(uart: &mut impl Write, data: &[u8]) {
    if uart.write_all(data).await.is_err() || uart.flush().await.is_err() {
        defmt::warn!("console: UART write error");
    }
}
