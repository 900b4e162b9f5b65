/// Per-call options of [`KexecLoader::load`](crate::KexecLoader::load).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KexecOptions {
    /// Fragments appended to the command line, separated by single spaces.
    pub extra_cmdline: Vec<String>,

    /// Keep the existing `bootargs` of the chosen node when the merged
    /// command line is empty.
    pub reuse_cmdline: bool,

    /// Reject kernels without a valid arm64 `Image` header.
    pub strict_image_header: bool,
}

impl KexecOptions {
    #[must_use]
    pub fn with_extra_cmdline(mut self, fragment: impl Into<String>) -> Self {
        self.extra_cmdline.push(fragment.into());
        self
    }

    #[must_use]
    pub const fn with_reuse_cmdline(mut self, reuse: bool) -> Self {
        self.reuse_cmdline = reuse;
        self
    }

    #[must_use]
    pub const fn with_strict_image_header(mut self, strict: bool) -> Self {
        self.strict_image_header = strict;
        self
    }
}
