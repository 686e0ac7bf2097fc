#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    file: TestFile,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, file: TestFile) -> Self {
        Self { name, group, file }
    }

    pub fn small(name: &'static str, file: TestFile) -> Self {
        Self::new(name, TestGroup::Small, file)
    }

    pub fn large(name: &'static str, file: TestFile) -> Self {
        Self::new(name, TestGroup::Large, file)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }
}

/// A multipart body fixture, stored with `\n` line endings
#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    boundary: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, boundary: &'static str, content: &'static str) -> Self {
        Self { file_name, boundary, content }
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    pub fn boundary(&self) -> &'static str {
        self.boundary
    }

    /// The body as sent on the wire, with `\r\n` line endings
    pub fn wire_bytes(&self) -> Vec<u8> {
        self.content.replace('\n', "\r\n").into_bytes()
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Large,
}
