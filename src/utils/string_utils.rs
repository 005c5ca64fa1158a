/// Corta `s` em no máximo `max_bytes` bytes sem quebrar um caractere UTF-8.
///
/// Usado para logar prefixos de grant codes sem expor o valor inteiro.
///
/// # Exemplo
/// ```
/// use zoho_crm_integration::utils::string_utils::truncate_safe;
///
/// assert_eq!(truncate_safe("1000.abcdef", 4), "1000");
/// assert_eq!(truncate_safe("Olá", 3), "Ol");
/// ```
pub fn truncate_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}
