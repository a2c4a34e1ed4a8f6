use alloy_primitives::{Address, B256, U256, keccak256};

/// Computes the addresses a Safe proxy factory hands out for `createProxyWithNonce`.
///
/// The factory deploys the proxy with CREATE2 where:
/// - the init code is the proxy creation bytecode followed by the ABI-encoded singleton address
/// - the salt is `keccak256(keccak256(initializer) ++ uint256(saltNonce))`
///
/// Everything that does not depend on the salt nonce is hashed once in [`AddressDeriver::new`],
/// leaving two keccak rounds per nonce on the hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AddressDeriver {
    /// Address of the factory contract performing the CREATE2 deployment
    factory: Address,
    /// Address of the singleton every proxy delegates to
    implementation: Address,
    /// Keccak256 hash of the proxy creation code with its constructor argument
    init_code_hash: B256,
}

impl AddressDeriver {
    /// Creates a deriver for proxies of `implementation` created by `factory`.
    ///
    /// # Arguments
    /// * `factory` - The address of the proxy factory
    /// * `creation_code` - The proxy creation bytecode, without constructor arguments
    /// * `implementation` - The singleton address passed to the proxy constructor
    pub(crate) fn new(factory: Address, creation_code: &[u8], implementation: Address) -> Self {
        let mut init_code = Vec::with_capacity(creation_code.len() + 32);
        init_code.extend_from_slice(creation_code);
        init_code.extend_from_slice(implementation.into_word().as_slice());

        Self {
            factory,
            implementation,
            init_code_hash: keccak256(&init_code),
        }
    }

    pub(crate) const fn factory(&self) -> Address {
        self.factory
    }

    pub(crate) const fn implementation(&self) -> Address {
        self.implementation
    }

    /// Salt the factory feeds into CREATE2 for a given initializer hash and nonce.
    pub(crate) fn salt(initializer_hash: B256, salt_nonce: U256) -> B256 {
        let mut buffer = [0u8; 64];
        buffer[..32].copy_from_slice(initializer_hash.as_slice());
        buffer[32..].copy_from_slice(&salt_nonce.to_be_bytes::<32>());
        keccak256(buffer)
    }

    /// Derives the proxy address from a precomputed initializer hash.
    ///
    /// This is the search loop entry point; callers hash the initializer once up front.
    pub(crate) fn derive_with_hash(&self, initializer_hash: B256, salt_nonce: U256) -> Address {
        self.factory
            .create2(Self::salt(initializer_hash, salt_nonce), self.init_code_hash)
    }

    /// Derives the proxy address for an initializer payload and salt nonce.
    pub(crate) fn derive(&self, initializer: &[u8], salt_nonce: U256) -> Address {
        self.derive_with_hash(keccak256(initializer), salt_nonce)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy_primitives::{address, b256, hex};
    use proptest::prelude::*;

    pub(crate) const FACTORY: Address = address!("0xfacffacffacffacffacffacffacffacffacffacf");
    pub(crate) const IMPLEMENTATION: Address =
        address!("0xbeefbeefbeefbeefbeefbeefbeefbeefbeefbeef");
    pub(crate) const CREATION_CODE: [u8; 18] = hex!("608060405234801561001057600080fd5b50");

    /// `transfer(0xbeef.., 1)`, 68 bytes.
    pub(crate) fn initializer() -> Vec<u8> {
        let mut payload = hex!("a9059cbb").to_vec();
        payload.extend_from_slice(IMPLEMENTATION.into_word().as_slice());
        payload.extend_from_slice(&U256::from(1).to_be_bytes::<32>());
        payload
    }

    fn derive_address(
        factory: Address,
        implementation: Address,
        creation_code: &[u8],
        initializer: &[u8],
        salt_nonce: U256,
    ) -> Address {
        AddressDeriver::new(factory, creation_code, implementation).derive(initializer, salt_nonce)
    }

    pub(crate) fn deriver() -> AddressDeriver {
        AddressDeriver::new(FACTORY, &CREATION_CODE, IMPLEMENTATION)
    }

    #[test]
    fn test_init_code_hash_includes_implementation() {
        assert_eq!(
            deriver().init_code_hash,
            b256!("0x091c0a82d44fcfdf345104cac7a4092397295480d89b7af6827eca516f8ae127")
        );
    }

    #[test]
    fn test_derive_fixture() {
        let initializer = initializer();
        assert_eq!(initializer.len(), 68);
        assert_eq!(
            keccak256(&initializer),
            b256!("0x2a5c8929d5ab825808ab2eeb9bfb1f2427b588e8ffa334b0a61f589a43f1dba0")
        );

        let zero = deriver().derive(&initializer, U256::ZERO);
        let one = deriver().derive(&initializer, U256::from(1));
        assert_eq!(zero, address!("0x55cdf945547ea61294dcd49204c4fd69341a74e0"));
        assert_eq!(one, address!("0x6b486b64010c1e50e0963deac4f4125807bb3925"));
        assert_ne!(zero, one);
    }

    #[test]
    fn test_one_shot_matches_precomputed() {
        let initializer = initializer();
        let nonce = U256::from(49_955);
        assert_eq!(
            derive_address(FACTORY, IMPLEMENTATION, &CREATION_CODE, &initializer, nonce),
            deriver().derive_with_hash(keccak256(&initializer), nonce)
        );
    }

    proptest! {
        #[test]
        fn test_derive_is_pure(
            factory in any::<[u8; 20]>(),
            implementation in any::<[u8; 20]>(),
            initializer in proptest::collection::vec(any::<u8>(), 0..256),
            nonce in any::<[u8; 32]>(),
        ) {
            let nonce = U256::from_be_bytes(nonce);
            let first = derive_address(factory.into(), implementation.into(), &CREATION_CODE, &initializer, nonce);
            let second = derive_address(factory.into(), implementation.into(), &CREATION_CODE, &initializer, nonce);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn test_single_byte_flip_changes_address(
            initializer in proptest::collection::vec(any::<u8>(), 1..128),
            index in any::<prop::sample::Index>(),
            nonce in any::<u64>(),
        ) {
            let nonce = U256::from(nonce);
            let mut flipped = initializer.clone();
            let at = index.index(flipped.len());
            flipped[at] ^= 0x01;
            prop_assert_ne!(deriver().derive(&initializer, nonce), deriver().derive(&flipped, nonce));
        }

        #[test]
        fn test_factory_byte_flip_changes_address(
            index in 0..20usize,
            bit in 0..8u8,
            nonce in any::<u64>(),
        ) {
            let initializer = initializer();
            let nonce = U256::from(nonce);
            let mut factory = FACTORY;
            factory.0[index] ^= 1 << bit;
            prop_assert_ne!(
                derive_address(FACTORY, IMPLEMENTATION, &CREATION_CODE, &initializer, nonce),
                derive_address(factory, IMPLEMENTATION, &CREATION_CODE, &initializer, nonce)
            );
        }

        #[test]
        fn test_implementation_byte_flip_changes_address(
            index in 0..20usize,
            bit in 0..8u8,
            nonce in any::<u64>(),
        ) {
            let initializer = initializer();
            let nonce = U256::from(nonce);
            let mut implementation = IMPLEMENTATION;
            implementation.0[index] ^= 1 << bit;
            prop_assert_ne!(
                derive_address(FACTORY, IMPLEMENTATION, &CREATION_CODE, &initializer, nonce),
                derive_address(FACTORY, implementation, &CREATION_CODE, &initializer, nonce)
            );
        }

        #[test]
        fn test_creation_code_byte_flip_changes_address(
            index in 0..CREATION_CODE.len(),
            bit in 0..8u8,
            nonce in any::<u64>(),
        ) {
            let initializer = initializer();
            let nonce = U256::from(nonce);
            let mut creation_code = CREATION_CODE;
            creation_code[index] ^= 1 << bit;
            prop_assert_ne!(
                derive_address(FACTORY, IMPLEMENTATION, &CREATION_CODE, &initializer, nonce),
                derive_address(FACTORY, IMPLEMENTATION, &creation_code, &initializer, nonce)
            );
        }

        #[test]
        fn test_nonce_change_changes_address(nonce in any::<u64>()) {
            let initializer = initializer();
            prop_assert_ne!(
                deriver().derive(&initializer, U256::from(nonce)),
                deriver().derive(&initializer, U256::from(nonce) + U256::from(1))
            );
        }
    }
}
