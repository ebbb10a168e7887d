//! Demonstrates homing and moving a motor on a Velmex VXM controller.

use simple_logger::SimpleLogger;
use std::time::Duration;
use vxm::{backend::list_serial_ports, Direction, Motor, Port};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Enable logging
    SimpleLogger::new().init().unwrap();

    let path = std::env::args()
        .nth(1)
        .or_else(|| list_serial_ports().into_iter().next())
        .ok_or("no serial port given and none found")?;

    // Open the port and home motor 1 against its negative limit.
    let mut port = Port::open_serial(&path)?;
    port.home(Motor::M1, Direction::Negative, 500, 200, Duration::from_secs(180))?;

    // The lead screw moves 1 mm every 400 steps.
    port.set_scale(400.0);
    port.set_speed(Motor::M1, 2000)?;
    port.move_units(Motor::M1, 25.0)?;
    port.run(None)?;

    // Watch the motor until it stops.
    while port.is_busy(Motor::M1, Duration::from_millis(200)) {
        println!("X = {:?}", port.try_position(Motor::M1, Duration::from_secs(1))?);
    }
    println!("final X = {}", port.position(Motor::M1, Duration::from_secs(1))?);
    Ok(())
}
