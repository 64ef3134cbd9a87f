//! Connection and mount lifecycle for one EEPROM.
//!
//! A session is either disconnected, connected (holding a bus handle), or mounted
//! (the bus handle now lives inside the filesystem's block adapter). Every lifecycle
//! failure leaves the session in the state it actually reached: transport failures drop
//! the bus, filesystem failures keep the bus but leave nothing mounted.

use crate::buffer::EepromBuffer;
use crate::bus::{Connector, Delay};
use crate::config::Config;
use crate::error::{ErrorClass, ErrorKind};
use crate::fs::{EeFs, MountError};
use crate::storage::Geometry;
use log::{error, info, warn};

/// Filesystem mounted over a session's bus.
pub type Volume<C, DL> = EeFs<EepromBuffer<<C as Connector>::Bus, DL>>;

enum Link<C: Connector, DL: Delay> {
    Disconnected,
    Connected(C::Bus),
    Mounted(Volume<C, DL>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    pub connected: bool,
    pub mounted: bool,
}

pub struct Session<C: Connector, DL: Delay + Clone> {
    config: Config,
    connector: C,
    delay: DL,
    link: Link<C, DL>,
}

impl<C: Connector, DL: Delay + Clone> Session<C, DL> {
    /// Create a disconnected session. Nothing touches the bus until `connect`.
    pub fn new(config: Config, connector: C, delay: DL) -> Result<Self, ErrorKind> {
        config.validate()?;
        Ok(Session {
            config,
            connector,
            delay,
            link: Link::Disconnected,
        })
    }

    /// Create a session and try to connect and mount. The outcome is visible through
    /// [`Session::status`]; only an invalid configuration is an error.
    pub fn open(config: Config, connector: C, delay: DL) -> Result<Self, ErrorKind> {
        let mut session = Session::new(config, connector, delay)?;
        if let Err(e) = session.reconnect() {
            warn!("Session opened without a mounted filesystem: {}", e);
        }
        Ok(session)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn geometry(&self) -> Geometry {
        self.config.geometry
    }

    pub fn status(&self) -> Status {
        match self.link {
            Link::Disconnected => Status {
                connected: false,
                mounted: false,
            },
            Link::Connected(_) => Status {
                connected: true,
                mounted: false,
            },
            Link::Mounted(_) => Status {
                connected: true,
                mounted: true,
            },
        }
    }

    /// Acquire a fresh bus handle, dropping any previous one and whatever was mounted on it.
    pub fn connect(&mut self) -> Result<(), ErrorKind> {
        self.link = Link::Disconnected;
        match self.connector.connect() {
            Ok(bus) => {
                info!("Bus connected");
                self.link = Link::Connected(bus);
                Ok(())
            }
            Err(e) => {
                error!("Bus connect failed: {}", e);
                Err(ErrorKind::Transport)
            }
        }
    }

    /// Mount the filesystem on the connected bus. Unformatted or corrupt media leaves the
    /// session connected and unmounted.
    pub fn initialize_filesystem(&mut self) -> Result<(), ErrorKind> {
        let bus = match core::mem::replace(&mut self.link, Link::Disconnected) {
            Link::Disconnected => return Err(ErrorKind::Disconnected),
            Link::Connected(bus) => bus,
            Link::Mounted(volume) => volume.into_device().into_bus(),
        };
        let buffer = EepromBuffer::new(bus, self.delay.clone(), &self.config);
        self.mount(buffer)
    }

    /// Drop all session state, then connect and mount again. Always does the full I/O.
    pub fn reconnect(&mut self) -> Result<(), ErrorKind> {
        info!("Reconnecting");
        self.link = Link::Disconnected;
        self.connect()?;
        self.initialize_filesystem()
    }

    /// Write an empty filesystem over the configured geometry and mount it.
    pub fn format(&mut self) -> Result<(), ErrorKind> {
        let bus = match core::mem::replace(&mut self.link, Link::Disconnected) {
            Link::Disconnected => return Err(ErrorKind::Disconnected),
            Link::Connected(bus) => bus,
            Link::Mounted(volume) => volume.into_device().into_bus(),
        };
        let mut buffer = EepromBuffer::new(bus, self.delay.clone(), &self.config);
        if let Err(e) = EeFs::format(&mut buffer) {
            error!("Format failed: {}", e);
            self.downgrade(e.clone(), buffer);
            return Err(e);
        }
        self.mount(buffer)
    }

    fn mount(&mut self, buffer: EepromBuffer<C::Bus, DL>) -> Result<(), ErrorKind> {
        match EeFs::mount(buffer) {
            Ok(volume) => {
                self.link = Link::Mounted(volume);
                Ok(())
            }
            Err(MountError { kind, device }) => {
                error!("Mount failed: {}", kind);
                self.downgrade(kind.clone(), device);
                Err(kind)
            }
        }
    }

    fn downgrade(&mut self, kind: ErrorKind, buffer: EepromBuffer<C::Bus, DL>) {
        self.link = if kind.class() == ErrorClass::Transport {
            Link::Disconnected
        } else {
            Link::Connected(buffer.into_bus())
        };
    }

    pub(crate) fn volume(&self) -> Result<&Volume<C, DL>, ErrorKind> {
        match &self.link {
            Link::Mounted(volume) => Ok(volume),
            Link::Connected(_) => Err(ErrorKind::NotMounted),
            Link::Disconnected => Err(ErrorKind::Disconnected),
        }
    }

    /// Run `op` against the mounted filesystem. A transport failure drops the bus.
    pub(crate) fn with_volume<T>(
        &mut self,
        op: impl FnOnce(&mut Volume<C, DL>) -> Result<T, ErrorKind>,
    ) -> Result<T, ErrorKind> {
        let volume = match &mut self.link {
            Link::Mounted(volume) => volume,
            Link::Connected(_) => return Err(ErrorKind::NotMounted),
            Link::Disconnected => return Err(ErrorKind::Disconnected),
        };
        let result = op(volume);
        if let Err(ErrorKind::Transport) = result {
            self.drop_bus();
        }
        result
    }

    pub(crate) fn drop_bus(&mut self) {
        warn!("Transport failure, dropping bus");
        self.link = Link::Disconnected;
    }
}
