//! 7-bit bus addresses and address sets.

/// A 7-bit I2C target address in the non-reserved range.
///
/// Addresses `0x00..=0x02` and `0x78..=0x7f` are reserved by the I2C specification and can never
/// be represented by this type, so they are never probed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Address(u8);

impl Address {
    /// Lowest non-reserved address.
    pub const FIRST: Self = Self(0x03);
    /// Highest non-reserved address.
    pub const LAST: Self = Self(0x77);

    /// Address of SHT40-AD1B parts, the most common variant.
    pub const SHT4X_A: Self = Self(0x44);
    /// Address of SHT40-BD1B parts.
    pub const SHT4X_B: Self = Self(0x45);
    /// Address of SHT40-CD1B parts.
    pub const SHT4X_C: Self = Self(0x46);

    /// Returns the address if it is not reserved.
    #[must_use]
    pub const fn new(address: u8) -> Option<Self> {
        if address >= Self::FIRST.0 && address <= Self::LAST.0 {
            Some(Self(address))
        } else {
            None
        }
    }

    /// Returns the raw 7-bit address.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Iterates over every non-reserved address, in ascending order.
    pub fn all() -> impl Iterator<Item = Address> {
        (Self::FIRST.0..=Self::LAST.0).map(Self)
    }

    /// Returns the SHT4x part name answering at this address, if any.
    #[must_use]
    pub const fn variant_name(self) -> Option<&'static str> {
        match self.0 {
            0x44 => Some("SHT40-AD1B"),
            0x45 => Some("SHT40-BD1B"),
            0x46 => Some("SHT40-CD1B"),
            _ => None,
        }
    }
}

impl From<Address> for u8 {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// A set of [`Address`]es, stored as a bitmap.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AddressSet {
    bits: u128,
}

impl AddressSet {
    /// Returns an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    /// Adds an address to the set.
    pub fn insert(&mut self, address: Address) {
        self.bits |= 1 << address.0;
    }

    /// Returns whether the address is part of the set.
    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        self.bits & (1 << address.0) != 0
    }

    /// Returns the number of addresses in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Returns whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// Iterates over the addresses of the set, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Address> + '_ {
        Address::all().filter(|address| self.contains(*address))
    }
}

impl FromIterator<Address> for AddressSet {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        let mut set = Self::new();
        for address in iter {
            set.insert(address);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_addresses_are_rejected() {
        for raw in [0x00, 0x01, 0x02, 0x78, 0x7f, 0x80, 0xff] {
            assert_eq!(Address::new(raw), None);
        }
        assert_eq!(Address::new(0x03).map(Address::get), Some(0x03));
        assert_eq!(Address::new(0x77).map(Address::get), Some(0x77));
    }

    #[test]
    fn test_all_covers_the_legal_range() {
        assert_eq!(Address::all().count(), 0x77 - 0x03 + 1);
        assert_eq!(Address::all().next(), Some(Address::FIRST));
        assert_eq!(Address::all().last(), Some(Address::LAST));
    }

    #[test]
    fn test_set() {
        let mut set = AddressSet::new();
        assert!(set.is_empty());

        set.insert(Address::SHT4X_B);
        set.insert(Address::SHT4X_A);
        set.insert(Address::SHT4X_A);

        assert_eq!(set.len(), 2);
        assert!(set.contains(Address::SHT4X_A));
        assert!(!set.contains(Address::SHT4X_C));
        assert!(set.iter().eq([Address::SHT4X_A, Address::SHT4X_B]));
    }

    #[test]
    fn test_variant_names() {
        assert_eq!(Address::SHT4X_A.variant_name(), Some("SHT40-AD1B"));
        assert_eq!(Address::new(0x19).and_then(Address::variant_name), None);
    }
}
