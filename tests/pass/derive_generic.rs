use lualite::prelude::*;

#[derive(NativeClass)]
#[lualite(name = "Slot")]
struct Slot<T: Clone + 'static> {
    #[lualite(get)]
    count: i64,
    #[allow(dead_code)]
    value: Option<T>,
}

fn main() {
    assert_eq!(<Slot<u8> as NativeClass>::CLASS_NAME, "Slot");
    let _ = ClassBuilder::<Slot<String>>::native();
}
