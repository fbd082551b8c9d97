use ash::vk;

/// 可以设置 debug name 的 gfx 对象
pub trait DebugType {
    fn debug_type_name() -> &'static str;
    fn vk_handle(&self) -> impl vk::Handle;
}
