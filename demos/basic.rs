use firstfit::Heap;

fn log_alloc(heap: &Heap, size: usize, addr: *mut u8) {
    println!("Requested {size} bytes of memory");
    println!("Received this address: {addr:?}");
    println!("{heap}");
}

fn main() {
    env_logger::init();

    let mut heap = Heap::os();

    let Some(origin) = heap.init(4096) else {
        eprintln!("could not map the first heap region");
        return;
    };
    println!("Heap starts at {origin:?}");

    let sizes = [8, 16, 1000, 20_000];
    let mut pointers = Vec::new();

    for size in sizes {
        match heap.allocate(size) {
            Some(ptr) => {
                log_alloc(&heap, size, ptr.as_ptr());
                pointers.push(ptr);
            }
            None => eprintln!("allocation of {size} bytes failed"),
        }
    }

    for ptr in pointers.into_iter().rev() {
        unsafe { heap.release(ptr.as_ptr()) };
    }

    println!("After releasing everything:\n{heap}");
}
