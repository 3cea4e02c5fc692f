//! Oracle release numbers

use std::fmt;

/**
    Oracle release number packed the way OCI reports server releases:

    `major << 24 | minor << 20 | update << 12 | patch << 8 | port_update`
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version(u32);

impl Version {
    /// Packs a release number. Each component is masked to its field width.
    pub const fn new(major: u8, minor: u8, update: u8, patch: u8, port_update: u8) -> Self {
        Self(
            (major as u32) << 24
            | ((minor as u32) & 0x0f) << 20
            | ((update as u32) & 0xff) << 12
            | ((patch as u32) & 0x0f) << 8
            | (port_update as u32)
        )
    }

    pub const fn from_packed(vernum: u32) -> Self {
        Self(vernum)
    }

    pub const fn packed(&self) -> u32 {
        self.0
    }

    pub const fn major(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn minor(&self) -> u8 {
        ((self.0 >> 20) & 0x0f) as u8
    }

    pub const fn update(&self) -> u8 {
        ((self.0 >> 12) & 0xff) as u8
    }

    pub const fn patch(&self) -> u8 {
        ((self.0 >> 8) & 0x0f) as u8
    }

    pub const fn port_update(&self) -> u8 {
        (self.0 & 0xff) as u8
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}.{}.{}.{}", self.major(), self.minor(), self.update(), self.patch(), self.port_update())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_release_components() {
        let ver = Version::new(19, 3, 0, 0, 0);
        assert_eq!(ver.packed(), 0x1330_0000);
        assert_eq!(ver.to_string(), "19.3.0.0.0");

        let ver = Version::from_packed(0x0920_3000);
        assert_eq!((ver.major(), ver.minor(), ver.update(), ver.patch(), ver.port_update()), (9, 2, 3, 0, 0));
    }

    #[test]
    fn orders_by_release() {
        assert!(Version::new(9, 2, 0, 2, 0) < Version::new(9, 2, 0, 3, 0));
        assert!(Version::new(10, 1, 0, 0, 0) > Version::new(9, 2, 0, 3, 0));
        assert!(Version::new(10, 2, 0, 1, 0) >= Version::new(10, 2, 0, 0, 0));
    }
}
