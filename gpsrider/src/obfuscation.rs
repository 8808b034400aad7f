/// Produces a `Cow<'static, str>` for a hook target name.
///
/// With the `obfuscate` feature the literal is stored encrypted and only
/// decoded when the target is built, so class and method names of the hooked
/// platform APIs do not show up in a `strings` dump of the library.
#[macro_export]
macro_rules! obf {
    ($lit:literal) => {{
        #[cfg(feature = "obfuscate")]
        {
            std::borrow::Cow::<'static, str>::Owned(obfstr::obfstr!($lit).to_string())
        }
        #[cfg(not(feature = "obfuscate"))]
        {
            std::borrow::Cow::<'static, str>::Borrowed($lit)
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn obf_yields_the_literal() {
        let name = crate::obf!("android.location.Location");
        assert_eq!(name, "android.location.Location");
    }
}
