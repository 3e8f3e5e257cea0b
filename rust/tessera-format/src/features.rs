use bitflags::bitflags;
use tessera_common::{Error, Result};

bitflags! {
    /// Attribute kinds carried by a field's postings.
    ///
    /// Document ids are always present and have no flag.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Features: u32 {
        const FREQUENCY = 0b0001;
        const POSITION = 0b0010;
        const OFFSET = 0b0100;
        const PAYLOAD = 0b1000;
    }
}

impl Features {
    /// Checks the dependencies between attribute kinds: positions need
    /// frequencies, offsets and payloads need positions.
    pub fn validate(self) -> Result<Features> {
        if self.contains(Features::POSITION) && !self.contains(Features::FREQUENCY) {
            return Err(Error::invalid_arg(
                "features",
                "positions require frequencies",
            ));
        }
        if self.intersects(Features::OFFSET | Features::PAYLOAD)
            && !self.contains(Features::POSITION)
        {
            return Err(Error::invalid_arg(
                "features",
                "offsets and payloads require positions",
            ));
        }
        Ok(self)
    }

    /// Decodes persisted feature bits, rejecting unknown or inconsistent flags.
    pub fn from_persisted(bits: u32, element: &str) -> Result<Features> {
        let features = Features::from_bits(bits).ok_or_else(|| {
            Error::invalid_format(element, format!("unknown feature bits {bits:#x}"))
        })?;
        features
            .validate()
            .map_err(|e| Error::invalid_format(element, e.to_string()))
    }
}
