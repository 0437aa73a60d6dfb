macro_rules! impl_kvlm_getter_single {
    ($($field:ident => $key:literal),+ $(,)?) => {
        $(pub fn $field(&self) -> Option<&str> {
            self.kvlm
                .get_single($key)
                .map(String::as_str)
        })+
    };
}
