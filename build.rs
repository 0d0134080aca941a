fn main() {
    #[cfg(not(any(feature = "bincode", feature = "messagepack")))]
    compile_error!(
        "the multi-field session store requires either the 'bincode' or 'messagepack' feature"
    );
}
