pub mod gpiochip;
pub mod swo_uart;
