use weft_core::ProviderKind;

pub fn list() {
    for kind in ProviderKind::all() {
        println!("{:<8} {}", kind.id(), kind.label());
    }
}
