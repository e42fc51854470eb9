//! USB-MIDI plumbing: the tasks that move packets between the USB endpoints and the queues the main loop polls.

use core::sync::atomic::{AtomicBool, Ordering};

use defmt::{info, panic, warn};
use embassy_stm32::{peripherals, usb};
use embassy_sync::{
    blocking_mutex::raw::CriticalSectionRawMutex,
    channel::{Channel, Receiver, Sender},
};
use embassy_usb::{
    class::midi::{Receiver as MidiReceiver, Sender as MidiSender},
    driver::EndpointError,
};
use gridkey_lib::{error::TransportError, io::Transport, midi_state::UsbMidiPacket};

pub type UsbDriver = usb::Driver<'static, peripherals::USB_OTG_FS>;

/// Packets each queue can hold. A bulk pull queues close to two hundred packets without yielding.
const PACKET_QUEUE_LEN: usize = 256;
/// Bytes in one full-speed bulk packet, and thus the most USB-MIDI packets written at once.
const MAX_PACKET_SIZE: usize = 64;

type PacketChannel = Channel<CriticalSectionRawMutex, UsbMidiPacket, PACKET_QUEUE_LEN>;

/// Packets from the host, waiting for the main loop.
static INBOUND: PacketChannel = Channel::new();
/// Packets for the host, waiting for the TX task.
static OUTBOUND: PacketChannel = Channel::new();
/// Whether a host has the MIDI interface open.
static CONNECTED: AtomicBool = AtomicBool::new(false);

/// The main loop's view of the USB-MIDI link; never blocks.
pub struct QueuedTransport {
    inbound: Receiver<'static, CriticalSectionRawMutex, UsbMidiPacket, PACKET_QUEUE_LEN>,
    outbound: Sender<'static, CriticalSectionRawMutex, UsbMidiPacket, PACKET_QUEUE_LEN>,
}

impl QueuedTransport {
    pub fn new() -> Self {
        Self {
            inbound: INBOUND.receiver(),
            outbound: OUTBOUND.sender(),
        }
    }
}

impl Transport for QueuedTransport {
    fn try_receive_packet(&mut self) -> Option<UsbMidiPacket> {
        self.inbound.try_receive().ok()
    }

    fn send_packet(&mut self, packet: UsbMidiPacket) -> Result<(), TransportError> {
        if !CONNECTED.load(Ordering::Relaxed) {
            return Err(TransportError::Disconnected);
        }
        self.outbound.try_send(packet).map_err(|_| TransportError::Full)
    }

    fn flush(&mut self) {
        // the TX task writes whatever is queued as soon as it runs
    }
}

#[doc(hidden)]
struct Disconnected {}

impl From<EndpointError> for Disconnected {
    fn from(val: EndpointError) -> Self {
        match val {
            EndpointError::BufferOverflow => panic!("Buffer overflow"),
            EndpointError::Disabled => Disconnected {},
        }
    }
}

/// Reads packets from the host into the inbound queue.
#[embassy_executor::task]
pub async fn midi_rx_task(mut class: MidiReceiver<'static, UsbDriver>) -> ! {
    loop {
        class.wait_connection().await;
        info!("USB connected");
        CONNECTED.store(true, Ordering::Relaxed);
        let _ = receive(&mut class).await;
        CONNECTED.store(false, Ordering::Relaxed);
        OUTBOUND.clear();
        info!("USB disconnected");
    }
}

/// Writes queued packets to the host, up to a full USB packet at a time.
#[embassy_executor::task]
pub async fn midi_tx_task(mut class: MidiSender<'static, UsbDriver>) -> ! {
    loop {
        class.wait_connection().await;
        let _ = transmit(&mut class).await;
    }
}

async fn receive(class: &mut MidiReceiver<'static, UsbDriver>) -> Result<(), Disconnected> {
    let mut buf = [0; MAX_PACKET_SIZE];
    loop {
        let n = class.read_packet(&mut buf).await?;
        for chunk in buf[..n].chunks_exact(4) {
            let packet = UsbMidiPacket::from_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if INBOUND.try_send(packet).is_err() {
                warn!("Inbound queue full; dropped {}", packet);
            }
        }
    }
}

async fn transmit(class: &mut MidiSender<'static, UsbDriver>) -> Result<(), Disconnected> {
    let mut buf = [0; MAX_PACKET_SIZE];
    loop {
        let first = OUTBOUND.receive().await;
        buf[..4].copy_from_slice(&first.to_bytes());
        let mut len = 4;
        while len < MAX_PACKET_SIZE {
            let Ok(packet) = OUTBOUND.try_receive() else {
                break;
            };
            buf[len..len + 4].copy_from_slice(&packet.to_bytes());
            len += 4;
        }
        class.write_packet(&buf[..len]).await?;
    }
}
